//! Clock provider bound to a single fixed civil time zone.
//!
//! All duration math in the system runs on `DateTime<FixedOffset>` values
//! produced here; text only appears at the storage and HTTP boundaries,
//! through the one canonical pattern.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Canonical timestamp pattern: day-month-year hour:minute:second.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// America/Mexico_City, UTC-6 year-round (no DST since 2022).
const TZ_OFFSET_SECS: i32 = 6 * 3600;

/// Instant type used throughout the core.
pub type Instant = DateTime<FixedOffset>;

/// Clock for the service's fixed civil time zone.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    offset: FixedOffset,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock {
    pub fn new() -> Self {
        // Statically valid: TZ_OFFSET_SECS is well inside chrono's range.
        let offset = FixedOffset::west_opt(TZ_OFFSET_SECS).expect("valid fixed offset");
        Self { offset }
    }

    /// Current instant in the service time zone, truncated to whole seconds
    /// so that `parse(format(now())) == now()` holds.
    pub fn now(&self) -> Instant {
        let now = Utc::now().with_timezone(&self.offset);
        now - Duration::nanoseconds(i64::from(now.timestamp_subsec_nanos()))
    }

    /// Format an instant in the canonical pattern.
    pub fn format(&self, instant: Instant) -> String {
        instant
            .with_timezone(&self.offset)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }

    /// Parse a canonical timestamp back into an instant.
    pub fn parse(&self, text: &str) -> Result<Instant> {
        let naive = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
            .map_err(|_| Error::InvalidTimestamp(text.to_string()))?;
        naive
            .and_local_timezone(self.offset)
            .single()
            .ok_or_else(|| Error::InvalidTimestamp(text.to_string()))
    }

    /// Elapsed whole seconds from `since` to `until`, clamped at zero.
    pub fn elapsed_seconds(&self, since: Instant, until: Instant) -> i64 {
        (until - since).num_seconds().max(0)
    }
}

/// Elapsed duration broken into hours/minutes/seconds for API payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationParts {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    /// Same duration as a flat second count.
    pub total_seconds: i64,
}

impl DurationParts {
    pub fn from_seconds(total: i64) -> Self {
        let total = total.max(0);
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
            total_seconds: total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_now_has_second_resolution() {
        let clock = SessionClock::new();
        let now = clock.now();
        assert_eq!(now.nanosecond(), 0);
    }

    #[test]
    fn test_format_parse_roundtrip() {
        let clock = SessionClock::new();
        let now = clock.now();
        let formatted = clock.format(now);
        let parsed = clock.parse(&formatted).unwrap();
        assert_eq!(now, parsed);
    }

    #[test]
    fn test_format_pattern() {
        let clock = SessionClock::new();
        let instant = clock.parse("25-12-2024 18:30:05").unwrap();
        assert_eq!(clock.format(instant), "25-12-2024 18:30:05");
    }

    #[test]
    fn test_parse_invalid() {
        let clock = SessionClock::new();
        assert!(clock.parse("not a date").is_err());
        assert!(clock.parse("").is_err());
        // ISO form is not the canonical pattern
        assert!(clock.parse("2024-12-25T18:30:05Z").is_err());
    }

    #[test]
    fn test_elapsed_seconds_clamps_negative() {
        let clock = SessionClock::new();
        let earlier = clock.parse("01-01-2024 00:00:00").unwrap();
        let later = clock.parse("01-01-2024 00:01:30").unwrap();
        assert_eq!(clock.elapsed_seconds(earlier, later), 90);
        assert_eq!(clock.elapsed_seconds(later, earlier), 0);
    }

    #[test]
    fn test_duration_parts() {
        let parts = DurationParts::from_seconds(3725);
        assert_eq!(parts.hours, 1);
        assert_eq!(parts.minutes, 2);
        assert_eq!(parts.seconds, 5);
        assert_eq!(parts.total_seconds, 3725);

        let zero = DurationParts::from_seconds(-10);
        assert_eq!(zero.total_seconds, 0);
    }
}
