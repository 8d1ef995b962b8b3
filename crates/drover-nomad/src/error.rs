use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NomadError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("job specification rejected: {0}")]
    SpecInvalid(String),

    #[error("evaluation failed with status {status}: {description}")]
    EvaluationFailed { status: String, description: String },

    #[error("no allocation found for job: {0}")]
    NoAllocation(String),

    #[error("allocation failed with status: {0}")]
    AllocationFailed(String),

    #[error("allocation {0} has already terminated")]
    AllocationTerminated(String),

    #[error("task {task} did not report a shell within {waited:?}")]
    ShellDiscoveryTimeout { task: String, waited: Duration },

    #[error("nomad API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid nomad address: {0}")]
    InvalidAddress(String),

    #[error("nomad tls: {0}")]
    Tls(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("exec session closed: {0}")]
    ExecClosed(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unix socket http error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NomadResult<T> = Result<T, NomadError>;
