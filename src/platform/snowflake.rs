//! Time-ordered message identifiers
//!
//! Platform message ids are snowflakes: the upper 42 bits hold milliseconds
//! since the platform epoch, the lower 22 bits hold worker/sequence data.
//! The reminder scheduler relies on this to recover when the last reminder
//! was sent from nothing but its stored id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform epoch (2015-01-01T00:00:00Z) in Unix milliseconds.
pub const PLATFORM_EPOCH_MS: u64 = 1_420_070_400_000;

/// Bits below the timestamp portion of a snowflake.
const TIMESTAMP_SHIFT: u32 = 22;

/// Mask for the non-timestamp portion.
const SEQUENCE_MASK: u64 = (1 << TIMESTAMP_SHIFT) - 1;

/// Platform message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Build an id whose embedded timestamp is `at`.
    ///
    /// Timestamps before the platform epoch saturate to the epoch.
    pub fn from_timestamp(at: DateTime<Utc>, sequence: u64) -> Self {
        let unix_ms = u64::try_from(at.timestamp_millis()).unwrap_or(0);
        let since_epoch = unix_ms.saturating_sub(PLATFORM_EPOCH_MS);
        MessageId((since_epoch << TIMESTAMP_SHIFT) | (sequence & SEQUENCE_MASK))
    }

    /// Creation time embedded in this id.
    pub fn created_at(&self) -> DateTime<Utc> {
        timestamp_of(*self)
    }
}

/// Derive the creation timestamp of a message from its id.
pub fn timestamp_of(id: MessageId) -> DateTime<Utc> {
    let unix_ms = (id.0 >> TIMESTAMP_SHIFT) + PLATFORM_EPOCH_MS;
    // 42 bits of offset cannot overflow i64 milliseconds
    DateTime::from_timestamp_millis(unix_ms as i64).unwrap_or_default()
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(MessageId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_of_known_id() {
        // 175928847299117063 >> 22 = 41944705796 ms after the platform epoch
        let id = MessageId(175_928_847_299_117_063);
        let expected = Utc.timestamp_millis_opt(1_462_015_105_796).unwrap();
        assert_eq!(timestamp_of(id), expected);
    }

    #[test]
    fn test_zero_id_is_platform_epoch() {
        let epoch = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(timestamp_of(MessageId(0)), epoch);
    }

    #[test]
    fn test_from_timestamp_preserves_millis() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 12).unwrap();
        let id = MessageId::from_timestamp(at, 7);
        assert_eq!(id.created_at(), at);
        assert_eq!(id.0 & SEQUENCE_MASK, 7);
    }

    #[test]
    fn test_ids_are_time_ordered() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap();
        // A high sequence on the earlier id must still sort first
        let a = MessageId::from_timestamp(earlier, SEQUENCE_MASK);
        let b = MessageId::from_timestamp(later, 0);
        assert!(a < b);
    }

    #[test]
    fn test_pre_epoch_timestamp_saturates() {
        let before = Utc.with_ymd_and_hms(2010, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(MessageId::from_timestamp(before, 0), MessageId(0));
    }

    #[test]
    fn test_parse_round_trip_through_string() {
        let id: MessageId = " 1234567890123 ".parse().unwrap();
        assert_eq!(id, MessageId(1_234_567_890_123));
        assert_eq!(id.to_string(), "1234567890123");
        assert!("not-a-number".parse::<MessageId>().is_err());
    }
}
