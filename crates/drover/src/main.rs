mod cli;
mod cmd;
mod env;
mod exit;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use drover_core::config::Config;
use drover_observe::{init_local_offset, init_logger};
use tracing::{debug, error};

use crate::{cli::Cli, env::CiEnv};

fn main() -> ExitCode {
    // Must run before any other thread exists.
    init_local_offset();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if tracing::dispatcher::has_been_set() {
                error!(error = %format!("{err:#}"), "drover failed");
            } else {
                eprintln!("drover: {err:#}");
            }
            let code = exit::exit_code(&err, |key| std::env::var(key).ok());
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())
        .and_then(|c| c.with_env(|key| std::env::var(key).ok()))
        .context("loading configuration")?;
    let log = config
        .log
        .clone()
        .with_level_override(cli.log_level.as_deref())?;
    init_logger(&log)?;

    let env = CiEnv::from_process();
    debug!(command = ?cli.command, nomad = ?config.nomad, "starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting the async runtime")?;
    runtime.block_on(cmd::dispatch(cli.command, &config, &env))
}
