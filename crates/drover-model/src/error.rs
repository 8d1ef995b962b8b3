use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid image reference: {0:?}")]
    InvalidImage(String),

    #[error("invalid {source_name} auth: username and password are both required")]
    IncompleteAuth { source_name: &'static str },

    #[error("invalid docker auth config: {0}")]
    InvalidDockerAuthConfig(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
