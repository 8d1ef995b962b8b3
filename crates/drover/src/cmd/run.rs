use std::path::Path;

use anyhow::{Context, Result, anyhow};
use drover_core::router::route_stage;
use drover_nomad::{ExecStreams, Orchestrator, SchedulerApi};
use tokio::io::AsyncWrite;
use tracing::info;

use crate::{env::CiEnv, exit::BuildError};

pub async fn execute<A: SchedulerApi>(
    orch: &Orchestrator<A>,
    env: &CiEnv,
    script: &Path,
    stage: &str,
) -> Result<()> {
    let job_id = env.job_id()?;
    let script = tokio::fs::read(script)
        .await
        .with_context(|| format!("reading stage script {}", script.display()))?;

    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    run_stage(orch, job_id, &script, stage, &mut stdout, &mut stderr).await
}

/// Pipe `script` into the shell of the task `stage` routes to.
pub async fn run_stage<A, O, E>(
    orch: &Orchestrator<A>,
    job_id: &str,
    script: &[u8],
    stage: &str,
    stdout: &mut O,
    stderr: &mut E,
) -> Result<()>
where
    A: SchedulerApi,
    O: AsyncWrite + Send + Unpin,
    E: AsyncWrite + Send + Unpin,
{
    let role = route_stage(stage);
    let task = role
        .fixed_task_name()
        .ok_or_else(|| anyhow!("stage {stage} routed to {role} tasks, which cannot run stages"))?;
    info!(stage, task, "running stage");

    let alloc = orch.wait_for_live_allocation(job_id).await?;
    let shell = orch.discover_shell(&alloc, task).await?;
    info!(task, shell = %shell, "using task shell");

    let mut stdin = script;
    let code = orch
        .exec(
            &alloc,
            task,
            &[shell],
            ExecStreams {
                stdin: &mut stdin,
                stdout,
                stderr,
            },
        )
        .await?;

    if code != 0 {
        return Err(BuildError(code).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use drover_nomad::{ExecutionContext, NomadError, WaitPolicy};

    use super::*;
    use drover_nomad::testing::{EXEC_OUTPUT, ScriptedApi, stub};

    fn ready() -> Vec<Vec<drover_model::nomad::AllocationListStub>> {
        vec![vec![stub("running", 3, &[("job", "running"), ("helper", "running")])]]
    }

    fn orchestrator(api: ScriptedApi) -> Orchestrator<ScriptedApi> {
        Orchestrator::new(api, ExecutionContext::new())
            .with_policy(WaitPolicy::uniform(Duration::from_millis(5)))
    }

    async fn run(orch: &Orchestrator<ScriptedApi>, stage: &str) -> (Result<()>, Vec<u8>) {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let res = run_stage(orch, "ci-job", b"echo hi\n", stage, &mut stdout, &mut stderr).await;
        (res, stdout)
    }

    #[tokio::test]
    async fn script_stages_run_in_job_task() {
        let orch = orchestrator(ScriptedApi::new(ready()));
        let (res, stdout) = run(&orch, "build_script").await;

        res.unwrap();
        assert_eq!(stdout, EXEC_OUTPUT);
        assert_eq!(orch.api().stdin(), "echo hi\n");
        let calls = orch.api().calls();
        assert!(calls.contains(&"read alloc-3 alloc/logs/job.stdout.0".to_string()));
        assert!(calls.contains(&"exec alloc-3 job /bin/bash".to_string()));
    }

    #[tokio::test]
    async fn source_stages_run_in_helper_task() {
        let orch = orchestrator(ScriptedApi::new(ready()));
        let (res, _) = run(&orch, "get_sources").await;

        res.unwrap();
        assert!(orch.api().calls().contains(&"exec alloc-3 helper /bin/bash".to_string()));
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_build_error() {
        let orch = orchestrator(ScriptedApi::new(ready()).with_exit_code(137));
        let (res, _) = run(&orch, "step_script").await;

        let err = res.unwrap_err();
        assert_eq!(err.downcast_ref::<BuildError>(), Some(&BuildError(137)));
        assert!(err.downcast_ref::<NomadError>().is_none());
    }

    #[tokio::test]
    async fn terminated_allocation_is_a_system_error() {
        let orch = orchestrator(ScriptedApi::new(ready()).terminated());
        let (res, _) = run(&orch, "build_script").await;

        let err = res.unwrap_err();
        assert!(err.downcast_ref::<BuildError>().is_none());
        assert!(matches!(
            err.downcast_ref::<NomadError>(),
            Some(NomadError::AllocationTerminated(id)) if id == "alloc-3"
        ));
        assert!(!orch.api().calls().iter().any(|c| c.starts_with("exec")));
    }
}
