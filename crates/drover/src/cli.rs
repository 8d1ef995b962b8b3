use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// GitLab Runner custom executor backed by Nomad.
#[derive(Debug, Parser)]
#[command(name = "drover", version, about)]
pub struct Cli {
    /// Config file. Defaults to /etc/drover/drover.toml when present.
    #[arg(long, global = true, env = "DROVER_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `drover_nomad=debug,info`.
    #[arg(long, global = true, env = "DROVER_LOG", value_name = "FILTER")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Print the executor configuration document for the runner.
    Config,
    /// Register the CI job on Nomad and wait for its allocation.
    Prepare,
    /// Execute one stage script inside the allocation.
    Run {
        /// Script generated by the runner for this stage.
        script: PathBuf,
        /// Stage name, e.g. `build_script` or `get_sources`.
        stage: String,
    },
    /// Release the allocation and stop the job.
    Cleanup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_takes_script_and_stage() {
        let cli = Cli::try_parse_from(["drover", "run", "/tmp/script.sh", "build_script"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Run {
                script: PathBuf::from("/tmp/script.sh"),
                stage: "build_script".into(),
            }
        );
    }

    #[test]
    fn global_flags_are_accepted_after_subcommand() {
        let cli = Cli::try_parse_from([
            "drover",
            "prepare",
            "--config",
            "/etc/drover/ci.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.command, Command::Prepare);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/drover/ci.toml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn run_without_stage_is_rejected() {
        assert!(Cli::try_parse_from(["drover", "run", "/tmp/script.sh"]).is_err());
        assert!(Cli::try_parse_from(["drover"]).is_err());
    }
}
