//! Scheduler API seam.
//!
//! [`SchedulerApi`] is the raw request surface the [`Orchestrator`](crate::Orchestrator)
//! drives; [`HttpApi`] implements it against a real Nomad agent.

mod exec;
mod http;
mod tls;
mod transport;

pub use http::HttpApi;

use std::fmt;

use async_trait::async_trait;
use drover_model::nomad::{
    Allocation, AllocationListStub, Evaluation, Job, JobRegisterResponse, JobValidateResponse,
};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::NomadResult;

/// Task log stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local ends of an exec session.
pub struct ExecStreams<'a> {
    pub stdin: &'a mut (dyn AsyncRead + Send + Unpin),
    pub stdout: &'a mut (dyn AsyncWrite + Send + Unpin),
    pub stderr: &'a mut (dyn AsyncWrite + Send + Unpin),
}

#[async_trait]
pub trait SchedulerApi: Send + Sync {
    async fn validate_job(&self, job: &Job) -> NomadResult<JobValidateResponse>;

    async fn register_job(&self, job: &Job) -> NomadResult<JobRegisterResponse>;

    async fn evaluation(&self, eval_id: &str) -> NomadResult<Evaluation>;

    async fn job_allocations(&self, job_id: &str) -> NomadResult<Vec<AllocationListStub>>;

    async fn allocation(&self, alloc_id: &str) -> NomadResult<Allocation>;

    /// Read a file from the allocation directory. `None` when it does not exist yet.
    async fn read_file(&self, alloc_id: &str, path: &str) -> NomadResult<Option<Vec<u8>>>;

    /// Run `command` in `task` and return its exit code.
    async fn exec(
        &self,
        alloc_id: &str,
        task: &str,
        command: &[String],
        streams: ExecStreams<'_>,
    ) -> NomadResult<i32>;

    /// Stop the job without purging it.
    async fn deregister_job(&self, job_id: &str) -> NomadResult<()>;
}
