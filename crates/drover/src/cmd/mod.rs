//! One module per executor stage.

mod cleanup;
mod config;
mod prepare;
mod run;

use anyhow::{Context, Result};
use drover_core::config::Config;
use drover_nomad::{
    CancelCoordinator, ExecutionContext, HttpApi, Orchestrator, SignalPolicy, WaitPolicy,
};

use crate::{cli::Command, env::CiEnv};

pub async fn dispatch(command: Command, config: &Config, env: &CiEnv) -> Result<()> {
    match command {
        Command::Config => config::execute(config, env),
        Command::Prepare => {
            let (orch, _signals) = connect(config, SignalPolicy::Honor)?;
            prepare::execute(&orch, config, env).await
        }
        Command::Run { script, stage } => {
            let (orch, _signals) = connect(config, SignalPolicy::Honor)?;
            run::execute(&orch, env, &script, &stage).await
        }
        Command::Cleanup => {
            // Cleanup must finish or the allocation is orphaned.
            let (orch, _signals) = connect(config, SignalPolicy::Ignore)?;
            cleanup::execute(&orch, env).await
        }
    }
}

fn connect(
    config: &Config,
    policy: SignalPolicy,
) -> Result<(Orchestrator<HttpApi>, CancelCoordinator)> {
    let api = HttpApi::new(&config.nomad).context("configuring the nomad client")?;
    let ctx = ExecutionContext::new();
    let signals =
        CancelCoordinator::install(ctx.clone(), policy).context("installing signal handlers")?;
    let wait = WaitPolicy::default().with_shell_timeout(config.job.shell_timeout());
    Ok((Orchestrator::new(api, ctx).with_policy(wait), signals))
}
