use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Wall-clock timestamp with second resolution.
///
/// Entities carry two of these: `created_at`, stamped once at creation, and
/// `updated_at`, bumped by every mutating property operation. The invariant
/// `updated_at >= created_at` holds because both are stamped from the same
/// monotonically sampled wall clock and `updated_at` is only ever re-stamped
/// to "now".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The current wall-clock time.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        Self(secs)
    }

    /// Construct from seconds since the UNIX epoch.
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Seconds since the UNIX epoch.
    pub const fn as_secs(&self) -> i64 {
        self.0
    }

    /// The epoch timestamp (second zero).
    pub const fn zero() -> Self {
        Self(0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}s)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_produces_reasonable_timestamp() {
        let ts = Timestamp::now();
        // Should be after 2020-01-01 (1577836800 s)
        assert!(ts.as_secs() > 1_577_836_800);
    }

    #[test]
    fn ordering() {
        let a = Timestamp::from_secs(100);
        let b = Timestamp::from_secs(200);
        assert!(a < b);
        assert_eq!(a, Timestamp::from_secs(100));
    }

    #[test]
    fn zero_is_smallest_practical() {
        assert!(Timestamp::zero() < Timestamp::now());
    }

    #[test]
    fn secs_roundtrip() {
        let ts = Timestamp::from_secs(1_700_000_000);
        assert_eq!(ts.as_secs(), 1_700_000_000);
    }

    #[test]
    fn serde_roundtrip() {
        let ts = Timestamp::from_secs(1_234_567_890);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "1234567890");
        let parsed: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, parsed);
    }

    #[test]
    fn display_format() {
        assert_eq!(format!("{}", Timestamp::from_secs(42)), "42");
    }
}
