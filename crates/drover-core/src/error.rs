use drover_model::{ModelError, TaskRole};
use thiserror::Error;

use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no task template configured for role: {0}")]
    MissingTaskRole(TaskRole),

    #[error("duplicate task name in job: {0}")]
    DuplicateTaskName(String),

    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("failed to render {task} task: {source}")]
    Template {
        task: String,
        #[source]
        source: TemplateError,
    },

    #[error("model error: {0}")]
    Model(#[from] ModelError),
}
