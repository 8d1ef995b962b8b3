//! Process exit status as the runner expects it.

use thiserror::Error;

pub const SYSTEM_FAILURE_ENV: &str = "SYSTEM_FAILURE_EXIT_CODE";
pub const BUILD_FAILURE_ENV: &str = "BUILD_FAILURE_EXIT_CODE";

const FALLBACK_EXIT_CODE: i32 = 1;

/// The stage script ran and exited non-zero.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("build failed with exit code {0}")]
pub struct BuildError(pub i32);

/// Exit code for a failed invocation.
///
/// [`BuildError`] anywhere in the chain maps to `BUILD_FAILURE_EXIT_CODE`,
/// anything else to `SYSTEM_FAILURE_EXIT_CODE`. Unset or unparsable values
/// fall back to 1.
pub fn exit_code<F>(err: &anyhow::Error, lookup: F) -> i32
where
    F: Fn(&str) -> Option<String>,
{
    let var = if err.downcast_ref::<BuildError>().is_some() {
        BUILD_FAILURE_ENV
    } else {
        SYSTEM_FAILURE_ENV
    };
    lookup(var)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(FALLBACK_EXIT_CODE)
}

#[cfg(test)]
mod tests {
    use anyhow::{Context, anyhow};

    use super::*;

    fn runner_env(key: &str) -> Option<String> {
        match key {
            SYSTEM_FAILURE_ENV => Some("2".into()),
            BUILD_FAILURE_ENV => Some("3".into()),
            _ => None,
        }
    }

    #[test]
    fn build_error_uses_build_failure_code() {
        let err = anyhow::Error::from(BuildError(137));
        assert_eq!(exit_code(&err, runner_env), 3);
    }

    #[test]
    fn build_error_survives_context() {
        let err = Err::<(), _>(BuildError(1))
            .context("stage build_script")
            .unwrap_err();
        assert_eq!(exit_code(&err, runner_env), 3);
    }

    #[test]
    fn other_errors_use_system_failure_code() {
        let err = anyhow!("nomad unreachable");
        assert_eq!(exit_code(&err, runner_env), 2);
    }

    #[test]
    fn missing_or_garbage_codes_fall_back_to_one() {
        let err = anyhow::Error::from(BuildError(5));
        assert_eq!(exit_code(&err, |_| None), 1);
        assert_eq!(exit_code(&err, |_| Some("soon".into())), 1);
    }
}
