//! Temporal values for phenomenon and result times
//!
//! `Timestamp` preserves the original lexical form for round-trip
//! serialization and normalizes to a UTC instant for comparison. Two
//! timestamps are equal when they denote the same instant, so
//! `2024-01-01T05:00:00Z` equals `2024-01-01T00:00:00-05:00`.
//!
//! Values without a timezone are treated as UTC.
//!
//! The component accessors (`year()`, `month()`, ...) back the temporal
//! filter functions; they extract from the UTC-normalized instant.

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A point in time with lexical-form preservation.
#[derive(Clone, Debug)]
pub struct Timestamp {
    /// Normalized UTC instant for comparison
    instant: DateTime<Utc>,
    /// Original string for round-trip serialization
    original: String,
}

impl Timestamp {
    /// Parse a timestamp string.
    ///
    /// Accepts:
    /// - RFC3339 with timezone: `2024-01-15T10:30:00Z`, `2024-01-15T10:30:00+05:00`
    /// - Without timezone (treated as UTC): `2024-01-15T10:30:00`
    /// - With fractional seconds: `2024-01-15T10:30:00.123Z`
    pub fn parse(s: &str) -> Result<Self> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self {
                instant: dt.with_timezone(&Utc),
                original: s.to_string(),
            });
        }

        for fmt in &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
        ] {
            if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(Self {
                    instant: ndt.and_utc(),
                    original: s.to_string(),
                });
            }
        }

        Err(Error::temporal(format!("cannot parse timestamp: {}", s)))
    }

    /// Build from a UTC instant; the lexical form is the RFC3339 rendering.
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self {
            original: instant.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            instant,
        }
    }

    /// The current time.
    pub fn now() -> Self {
        Self::from_instant(Utc::now())
    }

    /// Get the normalized UTC instant
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    /// Get the original string representation
    pub fn original(&self) -> &str {
        &self.original
    }

    // === Component accessors (temporal filter functions) ===

    /// Year component
    pub fn year(&self) -> i32 {
        self.instant.year()
    }

    /// Month component (1-12)
    pub fn month(&self) -> u32 {
        self.instant.month()
    }

    /// Day-of-month component (1-31)
    pub fn day(&self) -> u32 {
        self.instant.day()
    }

    /// Hour component (0-23)
    pub fn hour(&self) -> u32 {
        self.instant.hour()
    }

    /// Minute component (0-59)
    pub fn minute(&self) -> u32 {
        self.instant.minute()
    }

    /// Second component (0-59)
    pub fn second(&self) -> u32 {
        self.instant.second()
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant.cmp(&other.instant)
    }
}

impl Hash for Timestamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instant.hash(state);
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.original)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Timestamp::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339() {
        let ts = Timestamp::parse("2024-01-15T10:30:00Z").unwrap();
        assert_eq!(ts.year(), 2024);
        assert_eq!(ts.month(), 1);
        assert_eq!(ts.day(), 15);
        assert_eq!(ts.hour(), 10);
        assert_eq!(ts.minute(), 30);
        assert_eq!(ts.second(), 0);
    }

    #[test]
    fn test_offset_equality() {
        let a = Timestamp::parse("2024-01-01T05:00:00Z").unwrap();
        let b = Timestamp::parse("2024-01-01T00:00:00-05:00").unwrap();
        assert_eq!(a, b);
        assert_ne!(a.original(), b.original());
    }

    #[test]
    fn test_no_timezone_is_utc() {
        let a = Timestamp::parse("2024-01-15T10:30:00").unwrap();
        let b = Timestamp::parse("2024-01-15T10:30:00Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ordering() {
        let t1 = Timestamp::parse("2024-01-01T00:00:00Z").unwrap();
        let t2 = Timestamp::parse("2024-02-01T00:00:00Z").unwrap();
        assert!(t1 < t2);
    }

    #[test]
    fn test_roundtrip_preserves_lexical_form() {
        let raw = "2024-01-01T00:00:00+05:00";
        let ts = Timestamp::parse(raw).unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, format!("\"{}\"", raw));
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn test_reject_garbage() {
        assert!(Timestamp::parse("not-a-time").is_err());
    }
}
