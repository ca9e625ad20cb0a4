//! Thin RPC callers used by the submitter and termination clients. Both
//! ignore reply payloads beyond the success flag and print a diagnostic on
//! transport failure - they are collaborators, not part of the scheduling
//! core.

use std::net::SocketAddr;

use anyhow::Context as _;
use tarpc::{client, context, tokio_serde::formats::Json};

use crate::mr::job::Job;
use crate::mr::rpc::{self, ShutdownReply};

async fn dial_master(master_addr: &str) -> anyhow::Result<rpc::MasterRpcClient> {
    let sock: SocketAddr = master_addr
        .parse()
        .with_context(|| format!("invalid master address {}", master_addr))?;
    let transport = tarpc::serde_transport::tcp::connect(sock, Json::default).await?;
    Ok(rpc::MasterRpcClient::new(client::Config::default(), transport).spawn())
}

/// Issues `Master.SubmitJob` for `job` against `master_addr`.
pub async fn submit_job(job: Job, master_addr: &str) -> bool {
    let client = match dial_master(master_addr).await {
        Ok(c) => c,
        Err(e) => {
            println!("SubmitJob: error dialing {}: {}", master_addr, e);
            return false;
        }
    };
    match client.submit_job(context::current(), job).await {
        Ok(reply) => reply.is_ok,
        Err(e) => {
            println!("SubmitJob: error submitting job to {}: {}", master_addr, e);
            false
        }
    }
}

/// Issues `Master.Shutdown` against `master_addr`.
pub async fn do_shutdown(master_addr: &str) -> Option<ShutdownReply> {
    let client = match dial_master(master_addr).await {
        Ok(c) => c,
        Err(e) => {
            println!("DoShutdown: error dialing master {}: {}", master_addr, e);
            return None;
        }
    };
    match client.shutdown(context::current()).await {
        Ok(reply) => Some(reply),
        Err(e) => {
            println!("DoShutdown: error when shutting down master {}: {}", master_addr, e);
            None
        }
    }
}
