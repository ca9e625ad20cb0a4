use std::env;

use map_reduce_rs::mr::function;
use map_reduce_rs::mr::job::Job;
use map_reduce_rs::mr::sequential::run_sequentially;

/// `sequential <input>` - run a 5-map/3-reduce word count job against
/// `<input>` in this process, no RPC involved.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        println!("Usage: sequential <input>");
        return Ok(());
    }
    let input = &args[1];

    let job = Job::new(5, 3, input.clone())?;
    run_sequentially(&job, &function::wc::map, &function::wc::reduce)?;
    println!("Done, see {}", map_reduce_rs::mr::store::output_name(&job.input_path).display());
    Ok(())
}
