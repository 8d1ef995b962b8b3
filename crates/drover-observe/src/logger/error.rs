use thiserror::Error;

/// Failures while reading the `[log]` table or installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format {0:?}, want text, json or journald")]
    InvalidFormat(String),
    #[error("journald output requires linux")]
    JournaldNotSupported,
    #[error("journald: {0}")]
    JournaldInitFailed(String),
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
    #[error("unknown timezone {0:?}, want utc or local")]
    InvalidTimeZone(String),
    #[error("bad log filter {0}")]
    InvalidLevel(String),
}

pub type LoggerResult<T> = Result<T, LoggerError>;
