mod config;
mod error;
mod log;
mod object;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use object::LoggerFormat;
pub use object::LoggerLevel;
pub use object::{LoggerTimeZone, init_local_offset};

/// Install the process-wide tracing subscriber.
///
/// Output always goes to stderr (or journald). Stdout carries the `config`
/// document and the remote command output.
///
/// `LoggerTimeZone::Local` needs [`init_local_offset`] to have run before any
/// thread was spawned; UTC is used otherwise.
///
/// ```rust
/// use drover_observe::{LoggerConfig, init_logger};
///
/// init_logger(&LoggerConfig::default()).unwrap();
/// tracing::debug!("ready");
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    log::install(cfg)
}
