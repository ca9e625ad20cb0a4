use std::env;

use map_reduce_rs::mr::submit;

/// `terminate <master_addr>` - ask the master to shut itself and every
/// registered worker down.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        println!("Usage: terminate <master addr>");
        return Ok(());
    }
    let master_addr = &args[1];

    if let Some(reply) = submit::do_shutdown(master_addr).await {
        println!(
            "Master at {} shut down, workers reported {} total job(s)",
            master_addr, reply.n_jobs
        );
    }
    Ok(())
}
