//! Wire shapes for the two RPC services in the system: the master's
//! registration/submission/shutdown surface, and the worker's
//! task-execution/shutdown surface.
//!
//! Request parameters are passed as plain method arguments (the
//! `#[tarpc::service]` way) rather than as wrapper argument structs; the
//! reply shapes still carry the `is_ok` / `n_jobs` fields from the external
//! interface so the two ends agree on exactly what crosses the wire.

use serde::{Deserialize, Serialize};

use crate::mr::job::Job;

/// Which phase a `Worker.ExecuteJob` call is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    Map,
    Reduce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterReply {
    pub is_ok: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitJobReply {
    pub is_ok: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteJobReply {
    pub is_ok: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReply {
    pub n_jobs: i64,
    pub is_ok: bool,
}

/// RPC surface served by the master.
#[tarpc::service]
pub trait MasterRpc {
    /// A worker announces itself as idle and available for work.
    async fn register(worker_name: String) -> RegisterReply;
    /// The submitter hands the master a job to run.
    async fn submit_job(job: Job) -> SubmitJobReply;
    /// Tear the master and every known worker down.
    async fn shutdown() -> ShutdownReply;
}

/// RPC surface served by each worker.
#[tarpc::service]
pub trait WorkerRpc {
    /// The master assigns one map or reduce task to this worker.
    async fn execute_job(
        input_path: String,
        operation: JobType,
        job_number: i32,
        num_other_phase: i32,
    ) -> ExecuteJobReply;
    /// Tear this worker down.
    async fn shutdown() -> ShutdownReply;
}
