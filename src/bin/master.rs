use std::env;
use std::net::SocketAddr;

use anyhow::Context as _;
use futures::StreamExt;
use map_reduce_rs::mr::master::Master;
use map_reduce_rs::mr::rpc::MasterRpc;
use tarpc::{server::incoming::Incoming, tokio_serde::formats::Json};

/// `master <addr>` - start a master listening at `<addr>` (e.g.
/// `127.0.0.1:7777`), serving `Master.Register` / `Master.SubmitJob` /
/// `Master.Shutdown` while its run loop waits for jobs. A restarted master
/// begins with no worker registrations: there is no persisted master
/// state.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        println!("Usage: master <listen addr>");
        return Ok(());
    }
    let address: SocketAddr = args[1]
        .parse()
        .with_context(|| format!("invalid listen address {}", args[1]))?;

    let master = Master::new(address.to_string());

    let server_transport = tarpc::serde_transport::tcp::listen(address, Json::default).await?;
    let serving = master.clone();
    tokio::spawn(
        server_transport
            .filter_map(|r| async { r.ok() })
            .map(tarpc::server::BaseChannel::with_defaults)
            .execute(serving.serve()),
    );

    println!(
        "[Master] listening on {}, waiting for workers to register and a job to be submitted",
        address
    );

    master.run().await;
    Ok(())
}
