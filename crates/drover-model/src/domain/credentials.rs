use std::{collections::BTreeMap, fmt};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::{
    domain::image::image_domain,
    error::{ModelError, ModelResult},
};

/// Username/password pair for one image registry.
///
/// Serialized with PascalCase keys because task templates address it as
/// `{{Auth.Username}}` / `{{Auth.Password}}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
}

impl RegistryAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build from an optional pair, failing when only one half is present or
    /// either half is empty.
    pub fn from_pair(
        source_name: &'static str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> ModelResult<Self> {
        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Ok(Self::new(u, p)),
            _ => Err(ModelError::IncompleteAuth { source_name }),
        }
    }
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Registry credentials keyed by registry domain (not by image).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials(BTreeMap<String, RegistryAuth>);

impl Credentials {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Credentials holding a single entry.
    pub fn single(domain: impl Into<String>, auth: RegistryAuth) -> Self {
        let mut c = Self::new();
        c.insert(domain, auth);
        c
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Insert or overwrite the entry for `domain`.
    pub fn insert(&mut self, domain: impl Into<String>, auth: RegistryAuth) {
        self.0.insert(domain.into(), auth);
    }

    pub fn get(&self, domain: &str) -> Option<&RegistryAuth> {
        self.0.get(domain)
    }

    /// Credential whose domain equals the image's registry domain.
    ///
    /// No match is not an error: the image is pulled anonymously.
    pub fn for_image(&self, image: &str) -> ModelResult<Option<&RegistryAuth>> {
        Ok(self.get(image_domain(image)?))
    }

    /// Fold ordered sources into one map. Later sources overwrite earlier
    /// ones for the same domain.
    pub fn merge<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = Credentials>,
    {
        let mut out = Self::new();
        for source in sources {
            out.0.extend(source.0);
        }
        out
    }

    /// Decode a `DOCKER_AUTH_CONFIG` document.
    ///
    /// Each `auths` entry is either an object with a base64 `auth` field
    /// (`user:password`) or explicit `username`/`password`, or a bare base64
    /// string. Server keys are normalised with [`normalize_registry`].
    pub fn from_docker_auth_config(raw: &str) -> ModelResult<Self> {
        let config: DockerAuthConfig = serde_json::from_str(raw)
            .map_err(|e| ModelError::InvalidDockerAuthConfig(e.to_string()))?;

        let mut out = Self::new();
        for (server, entry) in config.auths {
            let auth = entry.decode(&server)?;
            out.insert(normalize_registry(&server), auth);
        }
        Ok(out)
    }
}

/// Reduce a docker config server key (`https://index.docker.io/v1/`) to the
/// bare registry domain used by image references (`docker.io`).
pub fn normalize_registry(server: &str) -> String {
    let s = server.trim();
    let s = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .unwrap_or(s);
    let host = s.split('/').next().unwrap_or(s);
    match host {
        "index.docker.io" | "registry-1.docker.io" | "registry.hub.docker.com" => {
            "docker.io".to_string()
        }
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct DockerAuthConfig {
    #[serde(default)]
    auths: BTreeMap<String, DockerAuthEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DockerAuthEntry {
    Encoded(String),
    Object {
        #[serde(default)]
        auth: Option<String>,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
}

impl DockerAuthEntry {
    fn decode(self, server: &str) -> ModelResult<RegistryAuth> {
        match self {
            DockerAuthEntry::Encoded(auth) => decode_basic(server, &auth),
            DockerAuthEntry::Object {
                auth: Some(auth), ..
            } => decode_basic(server, &auth),
            DockerAuthEntry::Object {
                username: Some(username),
                password: Some(password),
                ..
            } => Ok(RegistryAuth::new(username, password)),
            DockerAuthEntry::Object { .. } => Err(ModelError::InvalidDockerAuthConfig(format!(
                "entry for {server} has neither auth nor username/password"
            ))),
        }
    }
}

fn decode_basic(server: &str, encoded: &str) -> ModelResult<RegistryAuth> {
    let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
        ModelError::InvalidDockerAuthConfig(format!("entry for {server} is not base64: {e}"))
    })?;
    let text = String::from_utf8(bytes).map_err(|_| {
        ModelError::InvalidDockerAuthConfig(format!("entry for {server} is not utf-8"))
    })?;
    let (username, password) = text.split_once(':').ok_or_else(|| {
        ModelError::InvalidDockerAuthConfig(format!("entry for {server} lacks user:password"))
    })?;
    Ok(RegistryAuth::new(username, password))
}
