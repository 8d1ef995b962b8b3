use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::logger::{
    error::LoggerResult,
    object::{LoggerFormat, LoggerLevel, LoggerTimeZone},
};

/// `[log]` table of the drover config file.
///
/// ```toml
/// [log]
/// format = "json"
/// level = "drover_nomad=debug,info"
/// tz = "local"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    pub level: LoggerLevel,
    pub tz: LoggerTimeZone,
    /// Print the event target (module path) before the message.
    pub with_targets: bool,
    /// ANSI colors for text output; ignored unless stderr is a tty.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: LoggerLevel::default(),
            tz: LoggerTimeZone::Utc,
            with_targets: false,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stderr().is_terminal()
    }

    /// Swap in `level` (from `--log-level` or `DROVER_LOG`) when present.
    pub fn with_level_override(self, level: Option<&str>) -> LoggerResult<Self> {
        match level {
            Some(raw) => Ok(Self {
                level: raw.parse()?,
                ..self
            }),
            None => Ok(self),
        }
    }
}
