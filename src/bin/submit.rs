use std::env;

use map_reduce_rs::mr::job::Job;
use map_reduce_rs::mr::submit;

/// `submit <input> <master_addr> <M> <R>` - ask the master at
/// `<master_addr>` to run a job over `<input>` with `M` map tasks and `R`
/// reduce tasks.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 5 {
        println!("Usage: submit <input> <master addr> <M> <R>");
        return Ok(());
    }
    let input = &args[1];
    let master_addr = &args[2];
    let n_map: i32 = args[3].parse()?;
    let n_reduce: i32 = args[4].parse()?;

    let job = Job::new(n_map, n_reduce, input.clone())?;
    if submit::submit_job(job, master_addr).await {
        println!("Submitted job over {} to {}", input, master_addr);
    }
    Ok(())
}
