use std::env;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::Context as _;
use futures::StreamExt;
use map_reduce_rs::mr::function;
use map_reduce_rs::mr::rpc::WorkerRpc;
use map_reduce_rs::mr::worker::Worker;
use tarpc::{server::incoming::Incoming, tokio_serde::formats::Json};

/// `worker <master_addr> <own_addr>` - start a worker listening at
/// `<own_addr>`, register with the master at `<master_addr>`, and serve
/// `Worker.ExecuteJob` / `Worker.Shutdown` until told to stop.
///
/// Accepts connections up to an RPC budget (unbounded here, matching the
/// reference `nRPC = -1`); each connection is served concurrently, and
/// `n_jobs` is incremented for every accepted connection.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        println!("Usage: worker <master addr> <own addr>");
        return Ok(());
    }
    let master_addr = &args[1];
    let own_addr: SocketAddr = args[2]
        .parse()
        .with_context(|| format!("invalid listen address {}", args[2]))?;

    let worker = Worker::new(
        own_addr.to_string(),
        master_addr.clone(),
        function::map_fn(function::wc::map),
        function::reduce_fn(function::wc::reduce),
    );

    let server_transport = tarpc::serde_transport::tcp::listen(own_addr, Json::default).await?;
    let accepted = Arc::new(AtomicI64::new(0));
    let accepted_counter = accepted.clone();

    if !worker.register().await.unwrap_or(false) {
        println!(
            "[Worker {}] could not register with master {}, exiting",
            worker.name(),
            master_addr
        );
        return Ok(());
    }
    println!("[Worker {}] registered with master {}", worker.name(), master_addr);

    server_transport
        .filter_map(|r| async { r.ok() })
        .inspect(move |_| {
            accepted_counter.fetch_add(1, Ordering::SeqCst);
        })
        .map(tarpc::server::BaseChannel::with_defaults)
        .execute(worker.serve())
        .await;

    println!(
        "[Worker] listener closed after accepting {} connection(s), exiting",
        accepted.load(Ordering::SeqCst)
    );
    Ok(())
}
