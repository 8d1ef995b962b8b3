use serde::Deserialize;

use crate::nomad::null_as_default;

/// Result of `PUT /v1/validate/job`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobValidateResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub validation_errors: Vec<String>,
    #[serde(default)]
    pub warnings: String,
}

impl JobValidateResponse {
    /// Every error the scheduler reported, joined. `None` when the job is valid.
    pub fn failure(&self) -> Option<String> {
        let mut parts: Vec<&str> = self
            .validation_errors
            .iter()
            .map(String::as_str)
            .filter(|e| !e.trim().is_empty())
            .collect();
        if parts.is_empty() && !self.error.trim().is_empty() {
            parts.push(self.error.trim());
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

/// Result of `PUT /v1/jobs`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobRegisterResponse {
    #[serde(rename = "EvalID", default)]
    pub eval_id: String,
    #[serde(default)]
    pub warnings: String,
}
