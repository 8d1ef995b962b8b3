use anyhow::Result;
use drover_core::shell::stop_command;
use drover_model::{TaskRole, nomad::Allocation};
use drover_nomad::{ExecStreams, NomadResult, Orchestrator, SchedulerApi};
use tracing::{debug, info, warn};

use crate::env::CiEnv;

/// Unblock the task entrypoints, then deregister the job.
///
/// A job without a usable allocation is still deregistered.
pub async fn execute<A: SchedulerApi>(orch: &Orchestrator<A>, env: &CiEnv) -> Result<()> {
    let job_id = env.job_id()?;
    info!(job_id, "cleaning up");

    match orch.wait_for_allocation(job_id).await {
        Ok((alloc, false)) => {
            if let Err(err) = stop_entrypoint(orch, &alloc).await {
                warn!(alloc_id = %alloc.id, error = %err, "stop command failed");
            }
        }
        Ok((alloc, true)) => debug!(alloc_id = %alloc.id, "allocation already terminated"),
        Err(err) => warn!(error = %err, "no live allocation to stop"),
    }

    info!(job_id, "deregistering job");
    orch.deregister(job_id).await?;
    Ok(())
}

/// Write to the entrypoint FIFO through the job task's shell.
///
/// The entrypoint exits on the write, so Nomad may drop the session before
/// reporting an exit code.
async fn stop_entrypoint<A: SchedulerApi>(orch: &Orchestrator<A>, alloc: &Allocation) -> NomadResult<i32> {
    let task = TaskRole::Job.as_str();
    let shell = orch.discover_shell(alloc, task).await?;
    info!(alloc_id = %alloc.id, shell = %shell, "stopping allocation");

    let stop = stop_command();
    let mut stdin = stop.as_bytes();
    let mut stdout = tokio::io::sink();
    let mut stderr = tokio::io::stderr();
    let code = orch
        .exec(
            alloc,
            task,
            &[shell],
            ExecStreams {
                stdin: &mut stdin,
                stdout: &mut stdout,
                stderr: &mut stderr,
            },
        )
        .await?;
    debug!(code, "stop command finished");
    Ok(code)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use drover_nomad::{ExecutionContext, WaitPolicy};

    use super::*;
    use drover_nomad::testing::{ScriptedApi, stub};

    fn ci() -> CiEnv {
        CiEnv {
            job_env_id: Some("ci-job".into()),
            ..Default::default()
        }
    }

    fn orchestrator(api: ScriptedApi) -> Orchestrator<ScriptedApi> {
        Orchestrator::new(api, ExecutionContext::new())
            .with_policy(WaitPolicy::uniform(Duration::from_millis(5)))
    }

    #[tokio::test]
    async fn live_allocation_is_stopped_then_deregistered() {
        let api = ScriptedApi::new(vec![vec![stub("running", 2, &[("job", "running")])]]);
        let orch = orchestrator(api);

        execute(&orch, &ci()).await.unwrap();

        assert_eq!(orch.api().stdin(), "echo > /tmp/drover/stop_task\n");
        let calls = orch.api().calls();
        let exec = calls.iter().position(|c| c == "exec alloc-2 job /bin/bash").unwrap();
        let dereg = calls.iter().position(|c| c == "deregister ci-job").unwrap();
        assert!(exec < dereg);
    }

    #[tokio::test]
    async fn terminated_allocation_is_only_deregistered() {
        let api = ScriptedApi::new(vec![vec![stub("complete", 2, &[("job", "dead")])]]).terminated();
        let orch = orchestrator(api);

        execute(&orch, &ci()).await.unwrap();

        let calls = orch.api().calls();
        assert!(!calls.iter().any(|c| c.starts_with("exec")));
        assert_eq!(calls.last().map(String::as_str), Some("deregister ci-job"));
    }

    #[tokio::test]
    async fn missing_allocation_still_deregisters() {
        let orch = orchestrator(ScriptedApi::new(vec![vec![]]));

        execute(&orch, &ci()).await.unwrap();

        assert_eq!(orch.api().calls().last().map(String::as_str), Some("deregister ci-job"));
    }

    #[tokio::test]
    async fn dropped_stop_session_still_deregisters() {
        let api = ScriptedApi::new(vec![vec![stub("running", 2, &[("job", "running")])]])
            .with_closed_exec("1006 task exited");
        let orch = orchestrator(api);

        execute(&orch, &ci()).await.unwrap();

        let calls = orch.api().calls();
        assert!(calls.contains(&"exec alloc-2 job /bin/bash".to_string()));
        assert_eq!(calls.last().map(String::as_str), Some("deregister ci-job"));
    }

    #[tokio::test]
    async fn undiscovered_shell_still_deregisters() {
        let api = ScriptedApi::new(vec![vec![stub("running", 2, &[("job", "running")])]])
            .with_files([None]);
        let policy = WaitPolicy::uniform(Duration::from_millis(5))
            .with_shell_timeout(Some(Duration::from_millis(20)));
        let orch = Orchestrator::new(api, ExecutionContext::new()).with_policy(policy);

        execute(&orch, &ci()).await.unwrap();

        let calls = orch.api().calls();
        assert!(!calls.iter().any(|c| c.starts_with("exec")));
        assert_eq!(calls.last().map(String::as_str), Some("deregister ci-job"));
    }
}
