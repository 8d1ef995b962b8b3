use std::fmt;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

use crate::logger::object::LoggerTimeZone;

/// `fmt` layer timer printing RFC3339 timestamps in the configured zone.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoggerRfc3339(pub LoggerTimeZone);

impl LoggerRfc3339 {
    fn now(&self) -> Result<String, time::error::Format> {
        OffsetDateTime::now_utc()
            .to_offset(self.0.offset())
            .format(&Rfc3339)
    }
}

impl FormatTime for LoggerRfc3339 {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        match self.now() {
            Ok(ts) => write!(w, "{ts} "),
            Err(_) => w.write_str("<no-time> "),
        }
    }
}
