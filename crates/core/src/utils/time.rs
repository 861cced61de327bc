//! Wall-clock access and the timestamp format shared by associations and audit events.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::errors::{Error, Result};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Render `at` as an RFC 3339 UTC timestamp with microsecond precision.
pub fn to_rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in the audit/association timestamp format.
pub fn now_rfc3339(clock: &dyn Clock) -> String {
    to_rfc3339(clock.now())
}

/// Convert an RFC 3339 timestamp into a sortable score (seconds since the epoch).
///
/// Later instants always map to larger scores at microsecond resolution.
pub fn rfc3339_to_score(timestamp: &str) -> Result<f64> {
    let parsed = DateTime::parse_from_rfc3339(timestamp).map_err(|e| {
        Error::invalid_argument(format!("Invalid timestamp '{}': {}", timestamp, e))
    })?;
    Ok(parsed.timestamp_micros() as f64 / 1_000_000.0)
}
