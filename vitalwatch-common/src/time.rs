//! Timestamp utilities
//!
//! All persisted timestamps are UTC RFC 3339 text with fixed millisecond
//! precision, so lexicographic comparison in SQL matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for database storage
pub fn to_db_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current UTC timestamp in database storage format
pub fn now_db_timestamp() -> String {
    to_db_timestamp(now())
}

/// Parse a timestamp stored by [`to_db_timestamp`]
pub fn parse_db_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", raw, e)))
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_db_timestamp_round_trip() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 45).unwrap();
        let raw = to_db_timestamp(ts);
        assert_eq!(raw, "2025-06-01T12:30:45.000Z");
        assert_eq!(parse_db_timestamp(&raw).unwrap(), ts);
    }

    #[test]
    fn test_db_timestamps_order_lexicographically() {
        let earlier = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 45).unwrap();
        let later = earlier + chrono::Duration::milliseconds(7);
        assert!(to_db_timestamp(earlier) < to_db_timestamp(later));
    }

    #[test]
    fn test_parse_db_timestamp_rejects_garbage() {
        assert!(parse_db_timestamp("not-a-timestamp").is_err());
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(1500).as_millis(), 1500);
    }
}
