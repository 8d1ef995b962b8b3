use anyhow::{Context, Result};
use drover_core::{
    builder::{BuildRequest, JobBuilder},
    config::Config,
};
use drover_model::nomad::Job;
use drover_nomad::{Orchestrator, SchedulerApi};
use tracing::info;

use crate::env::CiEnv;

pub async fn execute<A: SchedulerApi>(
    orch: &Orchestrator<A>,
    config: &Config,
    env: &CiEnv,
) -> Result<()> {
    let job = build_job(config, env)?;
    info!(job_id = %job.id, tasks = job.tasks().count(), "validating job");
    orch.validate(&job).await?;

    info!(job_id = %job.id, "registering job");
    orch.register(&job).await?;

    info!(job_id = %job.id, "waiting for allocation");
    let alloc = orch.wait_for_live_allocation(&job.id).await?;
    info!(alloc_id = %alloc.id, node_id = %alloc.node_id, "allocation ready");
    Ok(())
}

pub fn build_job(config: &Config, env: &CiEnv) -> Result<Job> {
    let mut request = BuildRequest::new(env.job_id()?)
        .with_entrypoint(env.entrypoint()?)
        .with_services(env.services()?)
        .with_credentials(env.credentials()?);
    if let Some(image) = &env.image {
        request = request.with_image(image);
    }
    JobBuilder::new(config)
        .build(&request)
        .context("building the nomad job")
}
