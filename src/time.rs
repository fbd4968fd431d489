// src/time.rs

//! Timestamp keys.
//!
//! Log sessions, file-list snapshots and completion records are keyed by a
//! UTC timestamp with nanosecond precision. The key format is safe to embed
//! in file names.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::errors::{MountsyncError, Result};

const KEY_FORMAT: &str = "%Y%m%dT%H%M%S%.9fZ";

/// Current time in UTC.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn to_key(t: DateTime<Utc>) -> String {
    t.format(KEY_FORMAT).to_string()
}

pub fn from_key(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, KEY_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| MountsyncError::InvalidTimestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_keeps_nanoseconds() {
        let t = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let key = to_key(t);
        assert_eq!(key, "20231114T221320.123456789Z");
        assert_eq!(from_key(&key).unwrap(), t);
    }

    #[test]
    fn keys_sort_chronologically() {
        let a = Utc.timestamp_opt(1_700_000_000, 5).unwrap();
        let b = Utc.timestamp_opt(1_700_000_000, 50).unwrap();
        assert!(to_key(a) < to_key(b));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            from_key("yesterday"),
            Err(MountsyncError::InvalidTimestamp(_))
        ));
    }
}
