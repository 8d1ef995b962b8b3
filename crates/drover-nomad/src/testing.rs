//! Scripted in-memory [`SchedulerApi`] for orchestration tests.
//!
//! Every scripted queue pops one entry per call and keeps repeating its last
//! entry. Each call is recorded as a short line such as `exec alloc-2 job /bin/bash`.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use drover_model::nomad::{
    Allocation, AllocationListStub, Evaluation, Job, JobRegisterResponse, JobValidateResponse,
    TaskState,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::{
    api::{ExecStreams, SchedulerApi},
    error::{NomadError, NomadResult},
};

/// What every exec session writes to stdout before finishing.
pub const EXEC_OUTPUT: &[u8] = b"remote output\n";

#[derive(Debug, Clone)]
enum ExecOutcome {
    Exit(i32),
    Closed(String),
    Hang,
}

pub struct ScriptedApi {
    validation: JobValidateResponse,
    evals: Mutex<VecDeque<Evaluation>>,
    allocs: Mutex<VecDeque<Vec<AllocationListStub>>>,
    full: BTreeMap<String, Allocation>,
    terminated: bool,
    files: Mutex<VecDeque<Option<Vec<u8>>>>,
    exec: ExecOutcome,
    calls: Mutex<Vec<String>>,
    stdin: Mutex<Vec<u8>>,
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ScriptedApi {
    /// Scheduler whose allocation listings follow `allocs`.
    ///
    /// Evaluations complete at once, task stdout reports `/bin/bash` and exec
    /// sessions exit 0.
    pub fn new(allocs: Vec<Vec<AllocationListStub>>) -> Self {
        Self {
            validation: JobValidateResponse::default(),
            evals: Mutex::new([evaluation("complete")].into()),
            allocs: Mutex::new(allocs.into()),
            full: BTreeMap::new(),
            terminated: false,
            files: Mutex::new([Some(b"/bin/bash\n".to_vec())].into()),
            exec: ExecOutcome::Exit(0),
            calls: Mutex::new(Vec::new()),
            stdin: Mutex::new(Vec::new()),
        }
    }

    pub fn with_validation(mut self, validation: JobValidateResponse) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_evaluations(mut self, evals: impl IntoIterator<Item = Evaluation>) -> Self {
        self.evals = Mutex::new(evals.into_iter().collect());
        self
    }

    /// Reads of allocation files, in order. `None` is a missing file.
    pub fn with_files(mut self, files: impl IntoIterator<Item = Option<Vec<u8>>>) -> Self {
        self.files = Mutex::new(files.into_iter().collect());
        self
    }

    /// Full record returned for `alloc.id`.
    pub fn with_allocation(mut self, alloc: Allocation) -> Self {
        self.full.insert(alloc.id.clone(), alloc);
        self
    }

    /// Unscripted full records report a finished client.
    pub fn terminated(mut self) -> Self {
        self.terminated = true;
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exec = ExecOutcome::Exit(code);
        self
    }

    /// Exec sessions end with [`NomadError::ExecClosed`] instead of an exit code.
    pub fn with_closed_exec(mut self, reason: impl Into<String>) -> Self {
        self.exec = ExecOutcome::Closed(reason.into());
        self
    }

    /// Exec sessions never finish.
    pub fn with_hanging_exec(mut self) -> Self {
        self.exec = ExecOutcome::Hang;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Everything the last exec session sent on stdin.
    pub fn stdin(&self) -> String {
        String::from_utf8_lossy(&lock(&self.stdin)).into_owned()
    }

    fn record(&self, call: String) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn next<T: Clone + Default>(queue: &Mutex<VecDeque<T>>) -> T {
    let mut q = lock(queue);
    if q.len() > 1 {
        q.pop_front().unwrap_or_default()
    } else {
        q.front().cloned().unwrap_or_default()
    }
}

/// Allocation stub `alloc-<index>` with the given task states.
pub fn stub(status: &str, index: u64, tasks: &[(&str, &str)]) -> AllocationListStub {
    AllocationListStub {
        id: format!("alloc-{index}"),
        client_status: status.into(),
        create_index: index,
        task_states: tasks
            .iter()
            .map(|(name, state)| {
                (
                    name.to_string(),
                    TaskState {
                        state: state.to_string(),
                    },
                )
            })
            .collect(),
        ..Default::default()
    }
}

pub fn evaluation(status: &str) -> Evaluation {
    Evaluation {
        id: "eval-1".into(),
        status: status.into(),
        ..Default::default()
    }
}

/// Running allocation that is meant to keep running.
pub fn live_allocation(id: &str) -> Allocation {
    Allocation {
        id: id.into(),
        client_status: "running".into(),
        desired_status: "run".into(),
        ..Default::default()
    }
}

#[async_trait]
impl SchedulerApi for ScriptedApi {
    async fn validate_job(&self, job: &Job) -> NomadResult<JobValidateResponse> {
        self.record(format!("validate {}", job.id));
        Ok(self.validation.clone())
    }

    async fn register_job(&self, job: &Job) -> NomadResult<JobRegisterResponse> {
        self.record(format!("register {}", job.id));
        Ok(JobRegisterResponse {
            eval_id: "eval-1".into(),
            ..Default::default()
        })
    }

    async fn evaluation(&self, eval_id: &str) -> NomadResult<Evaluation> {
        self.record(format!("evaluation {eval_id}"));
        Ok(next(&self.evals))
    }

    async fn job_allocations(&self, job_id: &str) -> NomadResult<Vec<AllocationListStub>> {
        self.record(format!("allocations {job_id}"));
        Ok(next(&self.allocs))
    }

    async fn allocation(&self, alloc_id: &str) -> NomadResult<Allocation> {
        self.record(format!("allocation {alloc_id}"));
        if let Some(alloc) = self.full.get(alloc_id) {
            return Ok(alloc.clone());
        }
        let mut alloc = live_allocation(alloc_id);
        if self.terminated {
            alloc.client_status = "complete".into();
        }
        Ok(alloc)
    }

    async fn read_file(&self, alloc_id: &str, path: &str) -> NomadResult<Option<Vec<u8>>> {
        self.record(format!("read {alloc_id} {path}"));
        Ok(next(&self.files))
    }

    async fn exec(
        &self,
        alloc_id: &str,
        task: &str,
        command: &[String],
        streams: ExecStreams<'_>,
    ) -> NomadResult<i32> {
        self.record(format!("exec {alloc_id} {task} {}", command.join(" ")));
        let mut input = Vec::new();
        streams.stdin.read_to_end(&mut input).await?;
        *lock(&self.stdin) = input;

        match &self.exec {
            ExecOutcome::Exit(code) => {
                streams.stdout.write_all(EXEC_OUTPUT).await?;
                Ok(*code)
            }
            ExecOutcome::Closed(reason) => Err(NomadError::ExecClosed(reason.clone())),
            ExecOutcome::Hang => std::future::pending().await,
        }
    }

    async fn deregister_job(&self, job_id: &str) -> NomadResult<()> {
        self.record(format!("deregister {job_id}"));
        Ok(())
    }
}
