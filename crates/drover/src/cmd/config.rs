use std::{
    collections::BTreeMap,
    io::{self, Write},
    path::Path,
};

use anyhow::Result;
use drover_core::config::Config;
use drover_model::gitlab::{ConfigExecOutput, DriverInfo};

use crate::env::CiEnv;

pub fn execute(config: &Config, env: &CiEnv) -> Result<()> {
    let doc = document(config, env);
    let mut out = io::stdout().lock();
    serde_json::to_writer(&mut out, &doc)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

pub fn document(config: &Config, env: &CiEnv) -> ConfigExecOutput {
    let data = Path::new(&config.job.alloc_data_dir);
    let job_env = BTreeMap::from([("JOB_ENV_ID".to_string(), env.derived_job_id())]);

    ConfigExecOutput {
        driver: Some(DriverInfo {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
        builds_dir: Some(project_dir(data, "builds", &env.project_path)),
        cache_dir: Some(project_dir(data, "cache", &env.project_path)),
        builds_dir_is_shared: Some(false),
        job_env: Some(job_env),
        ..Default::default()
    }
}

fn project_dir(data: &Path, kind: &str, project_path: &str) -> String {
    let mut dir = data.join(kind);
    let project = project_path.trim_matches('/');
    if !project.is_empty() {
        dir.push(project);
    }
    dir.to_string_lossy().into_owned()
}
