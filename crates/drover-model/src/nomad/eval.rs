use serde::Deserialize;

pub const EVAL_STATUS_PENDING: &str = "pending";
pub const EVAL_STATUS_COMPLETE: &str = "complete";

/// Result of `GET /v1/evaluation/:id`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Evaluation {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub status: String,
    /// Scheduler's explanation for non-complete statuses.
    #[serde(default)]
    pub status_description: String,
}

impl Evaluation {
    pub fn is_pending(&self) -> bool {
        self.status == EVAL_STATUS_PENDING
    }

    pub fn is_complete(&self) -> bool {
        self.status == EVAL_STATUS_COMPLETE
    }
}
