use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context as _, Result};
use futures::future::BoxFuture;
use tarpc::{client, context, tokio_serde::formats::Json};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::mr::job::Job;
use crate::mr::rpc::{
    self, ExecuteJobReply, JobType, MasterRpc, RegisterReply, ShutdownReply, SubmitJobReply,
};
use crate::mr::store;
use crate::mr::util::fatal;

/// Bounded capacity for the registration and phase-completion queues.
const QUEUE_CAPACITY: usize = 100;

/// One entry per worker address the master has ever seen.
#[derive(Debug, Clone)]
struct WorkerInfo {
    address: String,
}

/// Owns a job, splits its input, and drives scheduling: pulls available
/// worker addresses from the registration queue, fans tasks out, waits for
/// per-phase completion, and finally merges reducer outputs.
///
/// The master never inspects the Workers table to pick a worker - it
/// dequeues whatever address is next on the registration queue. Workers
/// advertise themselves once at startup and again after every task, so the
/// queue tracks availability rather than identity.
#[derive(Clone)]
pub struct Master {
    #[allow(dead_code)]
    address: String,
    register_tx: mpsc::Sender<String>,
    register_rx: Arc<AsyncMutex<mpsc::Receiver<String>>>,
    map_done_tx: mpsc::Sender<()>,
    map_done_rx: Arc<AsyncMutex<mpsc::Receiver<()>>>,
    reduce_done_tx: mpsc::Sender<()>,
    reduce_done_rx: Arc<AsyncMutex<mpsc::Receiver<()>>>,
    submit_tx: mpsc::Sender<Job>,
    submit_rx: Arc<AsyncMutex<mpsc::Receiver<Job>>>,
    workers: Arc<Mutex<HashMap<String, WorkerInfo>>>,
    alive: Arc<AtomicBool>,
}

impl Master {
    pub fn new(address: impl Into<String>) -> Self {
        let (register_tx, register_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (map_done_tx, map_done_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (reduce_done_tx, reduce_done_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (submit_tx, submit_rx) = mpsc::channel(1);
        Self {
            address: address.into(),
            register_tx,
            register_rx: Arc::new(AsyncMutex::new(register_rx)),
            map_done_tx,
            map_done_rx: Arc::new(AsyncMutex::new(map_done_rx)),
            reduce_done_tx,
            reduce_done_rx: Arc::new(AsyncMutex::new(reduce_done_rx)),
            submit_tx,
            submit_rx: Arc::new(AsyncMutex::new(submit_rx)),
            workers: Arc::new(Mutex::new(HashMap::new())),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Waits for a submitted job, splits its input, drives the scheduler
    /// through both phases, merges the results, then loops back to wait for
    /// the next submission. A restarted master begins with an empty
    /// Workers table and registration queue; a master that merely finished
    /// a job keeps both, so stale addresses from workers that died mid-run
    /// can block a later phase indefinitely (see the design's open
    /// questions - this is inherited, not patched over here).
    pub async fn run(&self) {
        loop {
            println!("[Master] waiting for a job submission...");
            let job = {
                let mut rx = self.submit_rx.lock().await;
                rx.recv().await
            };
            let Some(job) = job else {
                break;
            };

            println!(
                "[Master] running job on {} ({} map / {} reduce)",
                job.input_path, job.n_map, job.n_reduce
            );
            if let Err(e) = store::split(&job.input_path, job.n_map) {
                fatal(format!("split failed: {:#}", e));
            }

            self.execute_job(&job).await;

            if let Err(e) = store::merge(&job.input_path, job.n_reduce) {
                fatal(format!("merge failed: {:#}", e));
            }
            println!(
                "[Master] job on {} finished, results at {}",
                job.input_path,
                store::output_name(&job.input_path).display()
            );
        }
    }

    async fn dequeue_worker(&self) -> String {
        let mut rx = self.register_rx.lock().await;
        rx.recv()
            .await
            .expect("registration queue closed while master is alive")
    }

    /// Two phases, strictly first-come-first-served against the
    /// registration queue: map tasks 0..n_map in order, a barrier on all
    /// n_map completions, then reduce tasks 0..n_reduce in order, barrier
    /// on all n_reduce completions.
    async fn execute_job(&self, job: &Job) {
        for m in 0..job.n_map {
            let worker = self.dequeue_worker().await;
            let this = self.clone();
            let input_path = job.input_path.clone();
            let n_reduce = job.n_reduce;
            tokio::spawn(async move { this.call_map(worker, input_path, m, n_reduce).await });
        }
        for _ in 0..job.n_map {
            self.map_done_rx.lock().await.recv().await;
        }
        println!("[Master] all {} map tasks have signalled completion", job.n_map);

        for r in 0..job.n_reduce {
            let worker = self.dequeue_worker().await;
            let this = self.clone();
            let input_path = job.input_path.clone();
            let n_map = job.n_map;
            tokio::spawn(async move { this.call_reduce(worker, input_path, r, n_map).await });
        }
        for _ in 0..job.n_reduce {
            self.reduce_done_rx.lock().await.recv().await;
        }
        println!(
            "[Master] all {} reduce tasks have signalled completion",
            job.n_reduce
        );
    }

    /// Dispatches one map task and unconditionally signals the phase
    /// barrier afterwards - a worker that failed to respond is
    /// indistinguishable from one that succeeded, by design (no
    /// reassignment on failure).
    async fn call_map(&self, worker: String, input_path: String, m: i32, n_reduce: i32) {
        let ok = call_worker_execute(&worker, input_path, JobType::Map, m, n_reduce).await;
        if !ok {
            eprintln!("[Master] map task #{} on {} failed or was unreachable", m, worker);
        }
        let _ = self.map_done_tx.send(()).await;
    }

    async fn call_reduce(&self, worker: String, input_path: String, r: i32, n_map: i32) {
        let ok = call_worker_execute(&worker, input_path, JobType::Reduce, r, n_map).await;
        if !ok {
            eprintln!("[Master] reduce task #{} on {} failed or was unreachable", r, worker);
        }
        let _ = self.reduce_done_tx.send(()).await;
    }

    /// Best-effort broadcast of `Worker.Shutdown` to every worker this
    /// master has ever seen; returns the sum of their reported job counts.
    async fn broadcast_shutdown(&self) -> i64 {
        let addrs: Vec<String> = self.workers.lock().unwrap().keys().cloned().collect();
        let mut total = 0i64;
        for addr in addrs {
            match dial_worker(&addr).await {
                Ok(worker) => match worker.shutdown(context::current()).await {
                    Ok(reply) => total += reply.n_jobs,
                    Err(e) => eprintln!("[Master] worker {} shutdown RPC failed: {}", addr, e),
                },
                Err(e) => eprintln!("[Master] could not dial worker {} for shutdown: {}", addr, e),
            }
        }
        total
    }
}

#[tarpc::server]
impl MasterRpc for Master {
    type RegisterFut = BoxFuture<'static, RegisterReply>;
    type SubmitJobFut = BoxFuture<'static, SubmitJobReply>;
    type ShutdownFut = BoxFuture<'static, ShutdownReply>;

    /// The registration queue is the single authoritative source of "a
    /// worker is currently idle and awaiting work"; the Workers table is
    /// just bookkeeping for shutdown broadcasts.
    fn register(self, _: context::Context, worker_name: String) -> Self::RegisterFut {
        Box::pin(async move {
            self.workers.lock().unwrap().insert(
                worker_name.clone(),
                WorkerInfo {
                    address: worker_name.clone(),
                },
            );
            if self.register_tx.send(worker_name.clone()).await.is_err() {
                eprintln!("[Master] registration queue closed, dropping {}", worker_name);
            }
            println!("[Master] worker {} registered", worker_name);
            RegisterReply { is_ok: true }
        })
    }

    /// At most one job may be active at a time; the submit channel has a
    /// single slot, so a second submission simply blocks until the first
    /// job is picked up by the run loop.
    fn submit_job(self, _: context::Context, job: Job) -> Self::SubmitJobFut {
        Box::pin(async move {
            println!("[Master] job submitted: {:?}", job);
            let ok = self.submit_tx.send(job).await.is_ok();
            SubmitJobReply { is_ok: ok }
        })
    }

    fn shutdown(self, _: context::Context) -> Self::ShutdownFut {
        Box::pin(async move {
            println!("[Master] shutdown requested");
            self.alive.store(false, Ordering::SeqCst);
            let n_jobs = self.broadcast_shutdown().await;
            // Give the reply a moment to flush before the process exits.
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                std::process::exit(0);
            });
            ShutdownReply { n_jobs, is_ok: true }
        })
    }
}

async fn dial_worker(addr: &str) -> Result<rpc::WorkerRpcClient> {
    let sock: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid worker address {}", addr))?;
    let transport = tarpc::serde_transport::tcp::connect(sock, Json::default).await?;
    Ok(rpc::WorkerRpcClient::new(client::Config::default(), transport).spawn())
}

async fn call_worker_execute(
    worker: &str,
    input_path: String,
    operation: JobType,
    job_number: i32,
    num_other_phase: i32,
) -> bool {
    let client = match dial_worker(worker).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[Master] dial {} failed: {}", worker, e);
            return false;
        }
    };
    match client
        .execute_job(context::current(), input_path, operation, job_number, num_other_phase)
        .await
    {
        Ok(reply) => reply.is_ok,
        Err(e) => {
            eprintln!("[Master] RPC to {} failed: {}", worker, e);
            false
        }
    }
}
