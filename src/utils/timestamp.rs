// file: src/utils/timestamp.rs
// description: submission timestamp parsing and display in a fixed reference zone
// reference: https://docs.rs/chrono

use crate::error::{ExportError, Result};
use chrono::{DateTime, FixedOffset, Offset, Utc};

const DISPLAY_FORMAT: &str = "%d %b %Y %I:%M:%S %p";

/// Single reference zone used for ordering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceZone {
    offset: FixedOffset,
}

impl ReferenceZone {
    pub fn from_hours(hours: i32) -> Result<Self> {
        FixedOffset::east_opt(hours * 3600)
            .map(|offset| Self { offset })
            .ok_or_else(|| ExportError::Config(format!("invalid timezone offset: {}h", hours)))
    }

    pub fn parse(&self, created: &str) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(created.trim())
            .ok()
            .map(|dt| dt.with_timezone(&self.offset))
    }

    /// Formats `created` for the CSV; unparseable input is returned unchanged.
    pub fn display(&self, created: &str) -> String {
        match self.parse(created) {
            Some(dt) => dt.format(DISPLAY_FORMAT).to_string(),
            None => created.to_string(),
        }
    }
}

impl Default for ReferenceZone {
    fn default() -> Self {
        // UTC+8
        Self {
            offset: FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }
}

/// Milliseconds since the epoch, used for signature windows.
pub fn epoch_millis(created: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(created.trim())
        .ok()
        .map(|dt| dt.timestamp_millis())
}
