//! CI job environment handed over by the runner.

use std::{fmt, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use drover_model::{
    Credentials, RegistryAuth,
    gitlab::{JobResponse, JobService},
    normalize_registry,
};

/// Variables read once at startup. Empty values count as unset.
///
/// Services and registry credentials are kept raw and only decoded by
/// [`CiEnv::services`] and [`CiEnv::credentials`], so a malformed value only
/// fails the stage that needs it.
#[derive(Debug, Clone, Default)]
pub struct CiEnv {
    pub runner_id: String,
    pub project_id: String,
    pub ci_job_id: String,
    pub project_path: String,
    /// `image:` of the CI job, if any.
    pub image: Option<String>,
    /// `CUSTOM_ENV_CI_JOB_SERVICES`, a JSON list.
    pub services_json: Option<String>,
    pub credential_sources: CredentialSources,
    /// Nomad job ID exported by `config` through `job_env`.
    pub job_env_id: Option<String>,
    pub job_response_file: Option<PathBuf>,
}

/// Undecoded registry credentials, merged in field order.
#[derive(Clone, Default)]
pub struct CredentialSources {
    pub registry: RegistryPair,
    pub dependency_proxy: RegistryPair,
    pub docker_auth_config: Option<String>,
}

#[derive(Clone, Default)]
pub struct RegistryPair {
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for CredentialSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSources")
            .field("registry", &self.registry.server)
            .field("dependency_proxy", &self.dependency_proxy.server)
            .field("docker_auth_config", &self.docker_auth_config.is_some())
            .finish()
    }
}

impl fmt::Debug for RegistryPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryPair")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl CiEnv {
    pub fn from_process() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let pair = |server: &str, user: &str, password: &str| RegistryPair {
            server: get(server),
            username: get(user),
            password: get(password),
        };

        Self {
            runner_id: get("CUSTOM_ENV_CI_RUNNER_ID").unwrap_or_default(),
            project_id: get("CUSTOM_ENV_CI_PROJECT_ID").unwrap_or_default(),
            ci_job_id: get("CUSTOM_ENV_CI_JOB_ID").unwrap_or_default(),
            project_path: get("CUSTOM_ENV_CI_PROJECT_PATH").unwrap_or_default(),
            image: get("CUSTOM_ENV_CI_JOB_IMAGE"),
            services_json: get("CUSTOM_ENV_CI_JOB_SERVICES"),
            credential_sources: CredentialSources {
                registry: pair(
                    "CUSTOM_ENV_CI_REGISTRY",
                    "CUSTOM_ENV_CI_REGISTRY_USER",
                    "CUSTOM_ENV_CI_REGISTRY_PASSWORD",
                ),
                dependency_proxy: pair(
                    "CUSTOM_ENV_CI_DEPENDENCY_PROXY_SERVER",
                    "CUSTOM_ENV_CI_DEPENDENCY_PROXY_USER",
                    "CUSTOM_ENV_CI_DEPENDENCY_PROXY_PASSWORD",
                ),
                docker_auth_config: get("CUSTOM_ENV_DOCKER_AUTH_CONFIG"),
            },
            job_env_id: get("JOB_ENV_ID"),
            job_response_file: get("JOB_RESPONSE_FILE").map(PathBuf::from),
        }
    }

    /// Stable Nomad job ID for this CI job.
    pub fn derived_job_id(&self) -> String {
        format!(
            "runner-{}-project-{}-job-{}",
            self.runner_id, self.project_id, self.ci_job_id
        )
    }

    /// Job ID for `prepare`, `run` and `cleanup`.
    pub fn job_id(&self) -> Result<&str> {
        self.job_env_id
            .as_deref()
            .ok_or_else(|| anyhow!("JOB_ENV_ID is not set; was the config stage skipped?"))
    }

    /// Decoded `services:` of the CI job.
    pub fn services(&self) -> Result<Vec<JobService>> {
        match &self.services_json {
            Some(raw) => serde_json::from_str(raw)
                .context("CUSTOM_ENV_CI_JOB_SERVICES is not a valid service list"),
            None => Ok(Vec::new()),
        }
    }

    /// Registry, dependency proxy and docker auth config, merged in that order.
    pub fn credentials(&self) -> Result<Credentials> {
        let sources = &self.credential_sources;
        let registry = sources.registry.resolve("CI registry")?;
        let proxy = sources.dependency_proxy.resolve("dependency proxy")?;
        let docker = match &sources.docker_auth_config {
            Some(raw) => Credentials::from_docker_auth_config(raw)
                .context("CUSTOM_ENV_DOCKER_AUTH_CONFIG is invalid")?,
            None => Credentials::new(),
        };
        Ok(Credentials::merge([registry, proxy, docker]))
    }

    /// `image.entrypoint` from the job response file, when there is one.
    pub fn entrypoint(&self) -> Result<Option<Vec<String>>> {
        let Some(path) = &self.job_response_file else {
            return Ok(None);
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading job response file {}", path.display()))?;
        let response: JobResponse = serde_json::from_str(&raw)
            .with_context(|| format!("decoding job response file {}", path.display()))?;
        Ok(response.image.and_then(|image| image.entrypoint))
    }
}

impl RegistryPair {
    /// One registry credential, or nothing when the server is unset.
    fn resolve(&self, source_name: &'static str) -> Result<Credentials> {
        let Some(server) = &self.server else {
            return Ok(Credentials::new());
        };
        let auth = RegistryAuth::from_pair(
            source_name,
            self.username.as_deref(),
            self.password.as_deref(),
        )?;
        Ok(Credentials::single(normalize_registry(server), auth))
    }
}
