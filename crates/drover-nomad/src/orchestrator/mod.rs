//! Orchestration client: drives a job from validation to a live allocation,
//! then execs into it.

mod alloc;
pub use alloc::{AllocPhase, classify, latest_allocation};

mod shell;

use std::time::Duration;

use drover_model::nomad::{Allocation, Job};
use tracing::{debug, info, instrument, trace};

use crate::{
    api::{ExecStreams, LogStream, SchedulerApi},
    context::ExecutionContext,
    error::{NomadError, NomadResult},
};

/// Polling intervals and the terminal-allocation predicate.
#[derive(Clone, Copy, Debug)]
pub struct WaitPolicy {
    /// Between evaluation polls while `pending`.
    pub eval_interval: Duration,
    /// Between allocation polls while the allocation is starting.
    pub startup_interval: Duration,
    /// Between allocation polls while some task is not running yet.
    pub alloc_interval: Duration,
    /// Between reads of the task stdout during shell discovery.
    pub shell_interval: Duration,
    /// Give up shell discovery after this long. `None` waits until cancelled.
    pub shell_timeout: Option<Duration>,
    /// Whether a settled allocation can no longer be exec'd into.
    pub terminated: fn(&Allocation) -> bool,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            eval_interval: Duration::from_secs(1),
            startup_interval: Duration::from_millis(200),
            alloc_interval: Duration::from_secs(1),
            shell_interval: Duration::from_secs(1),
            shell_timeout: None,
            terminated: Allocation::terminated,
        }
    }
}

impl WaitPolicy {
    /// Same interval for every loop.
    pub fn uniform(interval: Duration) -> Self {
        Self {
            eval_interval: interval,
            startup_interval: interval,
            alloc_interval: interval,
            shell_interval: interval,
            ..Self::default()
        }
    }

    /// Bound shell discovery by `timeout`; `None` keeps waiting until cancelled.
    pub fn with_shell_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.shell_timeout = timeout;
        self
    }
}

/// Typed operations over a [`SchedulerApi`].
///
/// Every scheduler call and every poll sleep goes through the shared
/// [`ExecutionContext`], so cancelling it unblocks whatever is in flight.
pub struct Orchestrator<A> {
    api: A,
    ctx: ExecutionContext,
    policy: WaitPolicy,
}

impl<A: SchedulerApi> Orchestrator<A> {
    /// Create an orchestrator with the default [`WaitPolicy`].
    pub fn new(api: A, ctx: ExecutionContext) -> Self {
        Self {
            api,
            ctx,
            policy: WaitPolicy::default(),
        }
    }

    /// Replace the polling intervals and terminal predicate.
    pub fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Context the calls are scoped to.
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Underlying request surface.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Fails with [`NomadError::SpecInvalid`] on any scheduler-reported error.
    #[instrument(level = "debug", skip_all, fields(job_id = %job.id))]
    pub async fn validate(&self, job: &Job) -> NomadResult<()> {
        let res = self.ctx.run(self.api.validate_job(job)).await?;
        if let Some(reason) = res.failure() {
            return Err(NomadError::SpecInvalid(reason));
        }
        if !res.warnings.is_empty() {
            info!(warnings = %res.warnings, "job validated with warnings");
        }
        Ok(())
    }

    /// Register the job and wait for its evaluation to complete.
    #[instrument(level = "debug", skip_all, fields(job_id = %job.id))]
    pub async fn register(&self, job: &Job) -> NomadResult<()> {
        let res = self.ctx.run(self.api.register_job(job)).await?;
        debug!(eval_id = %res.eval_id, "job registered");

        loop {
            let eval = self.ctx.run(self.api.evaluation(&res.eval_id)).await?;
            if eval.is_complete() {
                debug!(eval_id = %eval.id, "evaluation complete");
                return Ok(());
            }
            if !eval.is_pending() {
                return Err(NomadError::EvaluationFailed {
                    status: eval.status,
                    description: eval.status_description,
                });
            }
            trace!(eval_id = %eval.id, "evaluation pending");
            self.ctx.sleep(self.policy.eval_interval).await?;
        }
    }

    /// Wait until the job's latest allocation is fully running or complete.
    ///
    /// Returns the full allocation record and whether it has already
    /// terminated.
    #[instrument(level = "debug", skip(self))]
    pub async fn wait_for_allocation(&self, job_id: &str) -> NomadResult<(Allocation, bool)> {
        let alloc_id = loop {
            let stubs = self.ctx.run(self.api.job_allocations(job_id)).await?;
            let latest = latest_allocation(&stubs)
                .ok_or_else(|| NomadError::NoAllocation(job_id.to_string()))?;

            let phase = classify(latest);
            trace!(alloc_id = %latest.id, create_index = latest.create_index, ?phase, "allocation polled");
            match phase {
                AllocPhase::Ready | AllocPhase::Done => break latest.id.clone(),
                AllocPhase::Starting => self.ctx.sleep(self.policy.startup_interval).await?,
                AllocPhase::Waiting => self.ctx.sleep(self.policy.alloc_interval).await?,
                AllocPhase::Failed(status) => return Err(NomadError::AllocationFailed(status)),
            }
        };

        let alloc = self.ctx.run(self.api.allocation(&alloc_id)).await?;
        let terminated = (self.policy.terminated)(&alloc);
        debug!(alloc_id = %alloc.id, client_status = %alloc.client_status, terminated, "allocation settled");
        Ok((alloc, terminated))
    }

    /// [`Self::wait_for_allocation`], failing when the allocation is already terminal.
    pub async fn wait_for_live_allocation(&self, job_id: &str) -> NomadResult<Allocation> {
        match self.wait_for_allocation(job_id).await? {
            (alloc, true) => Err(NomadError::AllocationTerminated(alloc.id)),
            (alloc, false) => Ok(alloc),
        }
    }

    /// Snapshot of a task log stream. Empty when nothing was written yet.
    pub async fn task_logs(&self, alloc: &Allocation, task: &str, stream: LogStream) -> NomadResult<String> {
        let path = format!("alloc/logs/{task}.{stream}.0");
        let bytes = self.ctx.run(self.api.read_file(&alloc.id, &path)).await?;
        Ok(bytes
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default())
    }

    /// Run `command` inside `task` and return the remote exit code.
    #[instrument(level = "debug", skip(self, alloc, streams), fields(alloc_id = %alloc.id))]
    pub async fn exec(
        &self,
        alloc: &Allocation,
        task: &str,
        command: &[String],
        streams: ExecStreams<'_>,
    ) -> NomadResult<i32> {
        self.ctx
            .run(self.api.exec(&alloc.id, task, command, streams))
            .await
    }

    /// Stop the job. Not retried.
    #[instrument(level = "debug", skip(self))]
    pub async fn deregister(&self, job_id: &str) -> NomadResult<()> {
        self.ctx.run(self.api.deregister_job(job_id)).await
    }
}
