//! Single-process execution of a job: split, map every task, reduce every
//! task, merge. No RPC, no workers - useful for development and for
//! validating a map/reduce function pair before running distributed.

use crate::mr::job::Job;
use crate::mr::store::{self, KeyValue};

pub fn run_sequentially(
    job: &Job,
    map_fn: &dyn Fn(&str) -> Vec<KeyValue>,
    reduce_fn: &dyn Fn(&str, Vec<String>) -> String,
) -> anyhow::Result<()> {
    store::split(&job.input_path, job.n_map)?;

    for m in 0..job.n_map {
        store::execute_map(&job.input_path, m, job.n_reduce, map_fn)?;
    }
    for r in 0..job.n_reduce {
        store::execute_reduce(&job.input_path, r, job.n_map, reduce_fn)?;
    }

    store::merge(&job.input_path, job.n_reduce)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mr::function::wc;
    use std::fs::File;
    use std::io::{Read, Write};

    #[test]
    fn sequential_word_count_scenario_b_input() {
        let tmp = tempfile::tempdir().unwrap();
        let input_path = tmp.path().join("in.txt");
        File::create(&input_path)
            .unwrap()
            .write_all(b"the cat sat\nthe mat\n")
            .unwrap();

        let job = Job::new(2, 3, input_path.to_str().unwrap()).unwrap();
        run_sequentially(&job, &wc::map, &wc::reduce).unwrap();

        let mut out = String::new();
        File::open(store::output_name(&job.input_path))
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "cat\t1\nmat\t1\nsat\t1\nthe\t2\n");
    }
}
