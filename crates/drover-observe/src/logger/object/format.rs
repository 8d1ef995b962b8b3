use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::logger::LoggerError;

/// Where and how diagnostics are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerFormat {
    /// Plain lines on stderr; they end up in the job trace.
    #[default]
    Text,
    /// One JSON object per event on stderr.
    Json,
    /// systemd-journald. Linux only.
    #[serde(alias = "journal")]
    Journald,
}

impl LoggerFormat {
    pub const ALL: [LoggerFormat; 3] = [LoggerFormat::Text, LoggerFormat::Json, LoggerFormat::Journald];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoggerFormat::Text => "text",
            LoggerFormat::Json => "json",
            LoggerFormat::Journald => "journald",
        }
    }
}

impl FromStr for LoggerFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case("journal") {
            return Ok(LoggerFormat::Journald);
        }
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| LoggerError::InvalidFormat(s.to_string()))
    }
}

impl fmt::Display for LoggerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for format in LoggerFormat::ALL {
            assert_eq!(format.as_str().parse::<LoggerFormat>().unwrap(), format);
        }
        assert_eq!(" JSON ".parse::<LoggerFormat>().unwrap(), LoggerFormat::Json);
        assert_eq!("journal".parse::<LoggerFormat>().unwrap(), LoggerFormat::Journald);
    }

    #[test]
    fn unknown_names_are_rejected() {
        for input in ["", "xml", "logfmt"] {
            assert!(matches!(
                input.parse::<LoggerFormat>(),
                Err(LoggerError::InvalidFormat(_))
            ));
        }
    }

    #[test]
    fn config_values_are_lowercase() {
        let parsed: LoggerFormat = serde_json::from_str(r#""journal""#).unwrap();
        assert_eq!(parsed, LoggerFormat::Journald);
        assert_eq!(serde_json::to_string(&LoggerFormat::Json).unwrap(), r#""json""#);
        assert!(serde_json::from_str::<LoggerFormat>(r#""yaml""#).is_err());
    }
}
