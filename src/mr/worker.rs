use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use futures::future::BoxFuture;
use tarpc::{client, context, tokio_serde::formats::Json};

use crate::mr::function::{MapFn, ReduceFn};
use crate::mr::rpc::{self, ExecuteJobReply, JobType, RegisterReply, ShutdownReply, WorkerRpc};
use crate::mr::store;
use crate::mr::util::fatal;

/// An RPC endpoint that registers with the master, services one task at a
/// time by delegating to the Intermediate Store, then re-registers to
/// advertise availability again.
///
/// One `Worker` is only ever touched by one worker process; the master
/// never assigns a second task before the first one's `ExecuteJob` reply
/// has been observed, so there is no internal locking here beyond the
/// atomic needed to report `n_jobs` across cloned handler instances.
#[derive(Clone)]
pub struct Worker {
    name: String,
    master_addr: String,
    map_fn: MapFn,
    reduce_fn: ReduceFn,
    n_jobs: Arc<AtomicI64>,
}

impl Worker {
    pub fn new(
        name: impl Into<String>,
        master_addr: impl Into<String>,
        map_fn: MapFn,
        reduce_fn: ReduceFn,
    ) -> Self {
        Self {
            name: name.into(),
            master_addr: master_addr.into(),
            map_fn,
            reduce_fn,
            n_jobs: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of tasks this worker has executed so far.
    pub fn n_jobs(&self) -> i64 {
        self.n_jobs.load(Ordering::SeqCst)
    }

    /// Registers (or re-registers) this worker's own address with the
    /// master, signalling availability.
    pub async fn register(&self) -> Result<bool> {
        register_with_master(&self.master_addr, &self.name).await
    }
}

/// Dials the master and issues `Master.Register`.
pub async fn register_with_master(master_addr: &str, own_addr: &str) -> Result<bool> {
    let sock: SocketAddr = master_addr
        .parse()
        .with_context(|| format!("invalid master address {}", master_addr))?;
    let transport = tarpc::serde_transport::tcp::connect(sock, Json::default).await?;
    let client = rpc::MasterRpcClient::new(client::Config::default(), transport).spawn();
    let reply: RegisterReply = client
        .register(context::current(), own_addr.to_string())
        .await?;
    Ok(reply.is_ok)
}

#[tarpc::server]
impl WorkerRpc for Worker {
    type ExecuteJobFut = BoxFuture<'static, ExecuteJobReply>;
    type ShutdownFut = BoxFuture<'static, ShutdownReply>;

    /// Executes one map or reduce task, then re-registers with the master
    /// before replying - this "re-offer self after each task" discipline is
    /// what makes the registration queue double as an availability signal.
    ///
    /// Errors during the task itself are fatal to this worker process, not
    /// reported back over RPC: a split that can't be read or an
    /// intermediate file that can't be written is an input/filesystem
    /// error, and those are unrecoverable by design.
    fn execute_job(
        self,
        _: context::Context,
        input_path: String,
        operation: JobType,
        job_number: i32,
        num_other_phase: i32,
    ) -> Self::ExecuteJobFut {
        Box::pin(async move {
            println!(
                "[Worker {}] executing {:?} task #{} (input {})",
                self.name, operation, job_number, input_path
            );

            let map_fn = self.map_fn.clone();
            let reduce_fn = self.reduce_fn.clone();
            let task_input = input_path.clone();
            let result = tokio::task::spawn_blocking(move || match operation {
                JobType::Map => {
                    store::execute_map(&task_input, job_number, num_other_phase, &*map_fn)
                }
                JobType::Reduce => {
                    store::execute_reduce(&task_input, job_number, num_other_phase, &*reduce_fn)
                }
            })
            .await;

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => fatal(format!(
                    "worker {} {:?} task #{} failed: {:#}",
                    self.name, operation, job_number, e
                )),
                Err(e) => fatal(format!(
                    "worker {} {:?} task #{} panicked: {}",
                    self.name, operation, job_number, e
                )),
            }

            self.n_jobs.fetch_add(1, Ordering::SeqCst);
            println!(
                "[Worker {}] finished {:?} task #{}, re-registering",
                self.name, operation, job_number
            );
            if let Err(e) = register_with_master(&self.master_addr, &self.name).await {
                eprintln!("[Worker {}] re-registration failed: {}", self.name, e);
            }

            ExecuteJobReply { is_ok: true }
        })
    }

    fn shutdown(self, _: context::Context) -> Self::ShutdownFut {
        Box::pin(async move {
            println!("[Worker {}] shutdown requested", self.name);
            // Reply carries the actual completed-task count: the reference
            // assigns reply.NJobs before decrementing its own counter, so
            // its wire reply is not actually off by one either (see the
            // design's open questions).
            let n_jobs = self.n_jobs.load(Ordering::SeqCst);
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                std::process::exit(0);
            });
            ShutdownReply { n_jobs, is_ok: true }
        })
    }
}
