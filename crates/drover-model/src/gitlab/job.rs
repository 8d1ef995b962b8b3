use serde::{Deserialize, Serialize};

use crate::{domain::image_task_name, error::ModelResult};

/// Entry of `CI_JOB_SERVICES`.
///
/// Deserialized from the runner's lowercase JSON and serialized with the
/// PascalCase names service templates use (`{{Service.Name}}`). Absent
/// values serialize as `null`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "PascalCase", deserialize = "lowercase"))]
pub struct JobService {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub entrypoint: Option<Vec<String>>,
    #[serde(default)]
    pub command: Option<Vec<String>>,
}

impl JobService {
    /// Task name: the alias when set, else the image's short name.
    pub fn task_name(&self) -> ModelResult<String> {
        match self.alias.as_deref().map(str::trim) {
            Some(alias) if !alias.is_empty() => Ok(alias.to_string()),
            _ => image_task_name(&self.name).map(str::to_string),
        }
    }
}

/// Subset of the runner's job response file that drover reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct JobResponse {
    #[serde(default)]
    pub image: Option<JobResponseImage>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct JobResponseImage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub entrypoint: Option<Vec<String>>,
}
