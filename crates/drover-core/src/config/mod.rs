//! Executor configuration.
//!
//! Loaded once per invocation from a TOML file, overlaid with the standard
//! Nomad environment variables and passed by reference from then on.
//!
//! ```toml
//! image = "debian:bookworm"
//! helper_image = "registry.gitlab.com/gitlab-org/gitlab-runner/gitlab-runner-helper:x86_64-latest"
//!
//! [nomad]
//! address = "https://nomad.service.consul:4646"
//! token_file = "/etc/drover/token"
//! namespace = "ci"
//!
//! [nomad.tls]
//! ca_cert = "/etc/drover/nomad-ca.pem"
//! client_cert = "/etc/drover/client.pem"
//! client_key = "/etc/drover/client-key.pem"
//!
//! [job]
//! datacenters = ["dc1"]
//! alloc_data_dir = "/alloc/data"
//!
//! [job.task.job]
//! driver = "docker"
//! config = '''
//! image = {{toml Image}}
//! entrypoint = [{{toml ExecScript}}]
//! '''
//! ```

mod error;
pub use error::{ConfigError, ConfigResult};

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use drover_model::{TaskTemplates, nomad::ConsulUpstream};
use drover_observe::LoggerConfig;
use serde::Deserialize;
use tracing::debug;

/// Path read when no explicit config file is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/drover/drover.toml";

const DEFAULT_NOMAD_ADDR: &str = "http://127.0.0.1:4646";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Job image used when the CI job does not set one.
    pub image: String,
    /// Image of the `helper` task.
    pub helper_image: String,
    pub nomad: NomadConfig,
    pub job: JobConfig,
    pub log: LoggerConfig,
}

#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NomadConfig {
    /// `http(s)://host:port` or `unix:///path/to.sock`.
    pub address: String,
    pub token: Option<String>,
    /// File holding the ACL token; read at load time.
    pub token_file: Option<PathBuf>,
    pub region: Option<String>,
    pub namespace: Option<String>,
    pub tls: NomadTlsConfig,
}

/// `[nomad.tls]`: client TLS settings for `https://` addresses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NomadTlsConfig {
    /// PEM bundle of CAs trusted for the Nomad servers. Replaces the
    /// built-in web roots, together with `ca_path`.
    pub ca_cert: Option<PathBuf>,
    /// Directory of PEM CA files.
    pub ca_path: Option<PathBuf>,
    /// PEM client certificate chain for mutual TLS. Needs `client_key`.
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    /// Name the server certificate is checked against instead of the
    /// address host.
    pub server_name: Option<String>,
    /// Accept any server certificate.
    pub skip_verify: bool,
}

impl Default for NomadConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_NOMAD_ADDR.to_string(),
            token: None,
            token_file: None,
            region: None,
            namespace: None,
            tls: NomadTlsConfig::default(),
        }
    }
}

impl fmt::Debug for NomadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NomadConfig")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_file", &self.token_file)
            .field("region", &self.region)
            .field("namespace", &self.namespace)
            .field("tls", &self.tls)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    pub datacenters: Vec<String>,
    /// Shared allocation directory as seen from inside the tasks.
    pub alloc_data_dir: String,
    /// Service-mesh upstreams attached to the job group.
    pub upstreams: Vec<ConsulUpstream>,
    /// Task templates by role (`[job.task.job]`, `[job.task.helper]`, `[job.task.service]`).
    pub task: TaskTemplates,
    /// Upper bound on waiting for the entrypoint to report its shell.
    /// Unset means wait until cancelled.
    pub shell_timeout_secs: Option<u64>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            datacenters: vec!["dc1".to_string()],
            alloc_data_dir: "/alloc/data".to_string(),
            upstreams: Vec::new(),
            task: TaskTemplates::default(),
            shell_timeout_secs: None,
        }
    }
}

impl JobConfig {
    pub fn shell_timeout(&self) -> Option<Duration> {
        self.shell_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Parse a config document.
    pub fn from_toml(path: &Path, raw: &str) -> ConfigResult<Self> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &raw)
    }

    /// Load `path`, or [`DEFAULT_CONFIG_PATH`] when none is given.
    ///
    /// A missing default file yields the built-in defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    debug!(path = DEFAULT_CONFIG_PATH, "no config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Overlay `NOMAD_*` variables (including the TLS ones), then resolve the
    /// token file.
    ///
    /// Precedence for the token: `NOMAD_TOKEN`, then the token file (from
    /// `NOMAD_TOKEN_FILE` or the config), then the inline config token.
    pub fn with_env<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("NOMAD_ADDR") {
            self.nomad.address = v;
        }
        if let Some(v) = lookup("NOMAD_TOKEN_FILE") {
            self.nomad.token_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("NOMAD_REGION") {
            self.nomad.region = Some(v);
        }
        if let Some(v) = lookup("NOMAD_NAMESPACE") {
            self.nomad.namespace = Some(v);
        }
        self.nomad.tls.overlay(&lookup)?;

        match lookup("NOMAD_TOKEN") {
            Some(v) => self.nomad.token = Some(v),
            None => {
                if let Some(path) = &self.nomad.token_file {
                    let raw = std::fs::read_to_string(path).map_err(|source| {
                        ConfigError::TokenFile {
                            path: path.clone(),
                            source,
                        }
                    })?;
                    self.nomad.token = Some(raw.trim().to_string());
                }
            }
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.nomad.address.trim().is_empty() {
            return Err(ConfigError::Invalid("nomad.address must not be empty".into()));
        }
        if self.job.datacenters.is_empty() {
            return Err(ConfigError::Invalid("job.datacenters must not be empty".into()));
        }
        let tls = &self.nomad.tls;
        if tls.client_cert.is_some() != tls.client_key.is_some() {
            return Err(ConfigError::Invalid(
                "nomad.tls.client_cert and nomad.tls.client_key must be set together".into(),
            ));
        }
        Ok(())
    }
}

impl NomadTlsConfig {
    fn overlay<F>(&mut self, lookup: &F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |name: &str| lookup(name).filter(|v| !v.is_empty()).map(PathBuf::from);
        if let Some(p) = path("NOMAD_CACERT") {
            self.ca_cert = Some(p);
        }
        if let Some(p) = path("NOMAD_CAPATH") {
            self.ca_path = Some(p);
        }
        if let Some(p) = path("NOMAD_CLIENT_CERT") {
            self.client_cert = Some(p);
        }
        if let Some(p) = path("NOMAD_CLIENT_KEY") {
            self.client_key = Some(p);
        }
        if let Some(v) = lookup("NOMAD_TLS_SERVER_NAME").filter(|v| !v.is_empty()) {
            self.server_name = Some(v);
        }
        if let Some(v) = lookup("NOMAD_SKIP_VERIFY").filter(|v| !v.is_empty()) {
            self.skip_verify = parse_bool(&v).ok_or_else(|| {
                ConfigError::Invalid(format!("NOMAD_SKIP_VERIFY: not a boolean: {v}"))
            })?;
        }
        Ok(())
    }
}

/// Boolean spellings accepted by the Nomad CLI for `NOMAD_SKIP_VERIFY`.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
