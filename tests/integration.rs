//! End-to-end tests driving a real master and several real workers over
//! loopback TCP, matching the distributed scenarios in the design
//! (single worker, three workers, non-letter word count).

use std::fs::File;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use map_reduce_rs::mr::function;
use map_reduce_rs::mr::job::Job;
use map_reduce_rs::mr::master::Master;
use map_reduce_rs::mr::rpc::{MasterRpc, WorkerRpc};
use map_reduce_rs::mr::submit;
use map_reduce_rs::mr::worker::Worker;
use tarpc::server::incoming::Incoming;
use tarpc::tokio_serde::formats::Json;

fn port_base() -> u16 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    // Keep well clear of well-known ports; spread across a wide range to
    // make collisions between concurrently-run tests unlikely.
    20000 + (nanos % 20000) as u16
}

async fn spawn_master(addr: SocketAddr) -> Master {
    let master = Master::new(addr.to_string());
    let transport = tarpc::serde_transport::tcp::listen(addr, Json::default)
        .await
        .expect("master listener bind");
    let serving = master.clone();
    tokio::spawn(
        transport
            .filter_map(|r| async { r.ok() })
            .map(tarpc::server::BaseChannel::with_defaults)
            .execute(serving.serve()),
    );
    let run_master = master.clone();
    tokio::spawn(async move { run_master.run().await });
    master
}

async fn spawn_worker(addr: SocketAddr, master_addr: &str) {
    let worker = Worker::new(
        addr.to_string(),
        master_addr.to_string(),
        function::map_fn(function::wc::map),
        function::reduce_fn(function::wc::reduce),
    );
    let transport = tarpc::serde_transport::tcp::listen(addr, Json::default)
        .await
        .expect("worker listener bind");
    worker
        .register()
        .await
        .expect("initial registration with master");
    tokio::spawn(
        transport
            .filter_map(|r| async { r.ok() })
            .map(tarpc::server::BaseChannel::with_defaults)
            .execute(worker.serve()),
    );
}

async fn wait_for_output(path: &std::path::Path) {
    for _ in 0..200 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {}", path.display());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_a_single_worker_word_count() {
    let base = port_base();
    let master_addr: SocketAddr = format!("127.0.0.1:{}", base).parse().unwrap();
    spawn_master(master_addr).await;

    let worker_addr: SocketAddr = format!("127.0.0.1:{}", base + 1).parse().unwrap();
    spawn_worker(worker_addr, &master_addr.to_string()).await;

    let tmp = tempfile::tempdir().unwrap();
    let input_path = tmp.path().join("in.txt");
    File::create(&input_path)
        .unwrap()
        .write_all(b"the cat sat\nthe mat\n")
        .unwrap();
    let input_path_str = input_path.to_str().unwrap().to_string();

    let job = Job::new(2, 2, input_path_str.clone()).unwrap();
    assert!(submit::submit_job(job, &master_addr.to_string()).await);

    let output_path = map_reduce_rs::mr::store::output_name(&input_path_str);
    wait_for_output(&output_path).await;

    let mut out = String::new();
    File::open(&output_path).unwrap().read_to_string(&mut out).unwrap();
    assert_eq!(out, "cat\t1\nmat\t1\nsat\t1\nthe\t2\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_b_three_workers_same_result() {
    let base = port_base();
    let master_addr: SocketAddr = format!("127.0.0.1:{}", base).parse().unwrap();
    spawn_master(master_addr).await;

    for i in 1..=3u16 {
        let worker_addr: SocketAddr = format!("127.0.0.1:{}", base + i).parse().unwrap();
        spawn_worker(worker_addr, &master_addr.to_string()).await;
    }

    let tmp = tempfile::tempdir().unwrap();
    let input_path = tmp.path().join("in.txt");
    File::create(&input_path)
        .unwrap()
        .write_all(b"the cat sat\nthe mat\n")
        .unwrap();
    let input_path_str = input_path.to_str().unwrap().to_string();

    let job = Job::new(2, 3, input_path_str.clone()).unwrap();
    assert!(submit::submit_job(job, &master_addr.to_string()).await);

    let output_path = map_reduce_rs::mr::store::output_name(&input_path_str);
    wait_for_output(&output_path).await;

    let mut out = String::new();
    File::open(&output_path).unwrap().read_to_string(&mut out).unwrap();
    assert_eq!(out, "cat\t1\nmat\t1\nsat\t1\nthe\t2\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_e_shutdown_collects_job_counts() {
    let base = port_base();
    let master_addr: SocketAddr = format!("127.0.0.1:{}", base).parse().unwrap();
    spawn_master(master_addr).await;

    for i in 1..=2u16 {
        let worker_addr: SocketAddr = format!("127.0.0.1:{}", base + i).parse().unwrap();
        spawn_worker(worker_addr, &master_addr.to_string()).await;
    }

    let tmp = tempfile::tempdir().unwrap();
    let input_path = tmp.path().join("in.txt");
    File::create(&input_path)
        .unwrap()
        .write_all(b"the cat sat\nthe mat\n")
        .unwrap();
    let input_path_str = input_path.to_str().unwrap().to_string();

    let job = Job::new(2, 2, input_path_str.clone()).unwrap();
    assert!(submit::submit_job(job, &master_addr.to_string()).await);

    let output_path = map_reduce_rs::mr::store::output_name(&input_path_str);
    wait_for_output(&output_path).await;

    // 4 tasks total were executed (2 map + 2 reduce) across the two
    // workers; each worker reports its real completed-task count, so the
    // sum must be at least 4.
    let reply = submit::do_shutdown(&master_addr.to_string())
        .await
        .expect("shutdown reply");
    assert!(reply.is_ok);
    assert!(reply.n_jobs >= 4);
}
