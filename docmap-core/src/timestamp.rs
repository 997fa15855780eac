//! Wire timestamp: seconds and nanoseconds since the Unix epoch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, ConversionResult};

/// A point in time as carried on the wire, independent of any store's date type.
///
/// Valid values lie between `0001-01-01T00:00:00Z` and `9999-12-31T23:59:59.999999999Z`
/// with `nanos` in `0..1_000_000_000`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    /// Seconds of `0001-01-01T00:00:00Z`.
    pub const MIN_SECONDS: i64 = -62_135_596_800;
    /// Seconds of `9999-12-31T23:59:59Z`.
    pub const MAX_SECONDS: i64 = 253_402_300_799;

    const NANOS_PER_SECOND: i64 = 1_000_000_000;
    const NANOS_PER_MILLI: i64 = 1_000_000;

    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// Checks that the timestamp is representable.
    pub fn validate(&self) -> ConversionResult<()> {
        if !(Self::MIN_SECONDS..=Self::MAX_SECONDS).contains(&self.seconds) {
            return Err(ConversionError::BadTimestamp(format!(
                "seconds {} out of range",
                self.seconds
            )));
        }
        if !(0..Self::NANOS_PER_SECOND).contains(&i64::from(self.nanos)) {
            return Err(ConversionError::BadTimestamp(format!(
                "nanos {} out of range",
                self.nanos
            )));
        }

        Ok(())
    }

    /// Builds a timestamp from milliseconds since the epoch.
    pub fn from_millis(millis: i64) -> ConversionResult<Self> {
        let timestamp = Self {
            seconds: millis.div_euclid(1_000),
            // rem_euclid keeps the value in 0..1000
            nanos: (millis.rem_euclid(1_000) * Self::NANOS_PER_MILLI) as i32,
        };
        timestamp.validate()?;

        Ok(timestamp)
    }

    /// Milliseconds since the epoch; sub-millisecond precision is truncated.
    pub fn to_millis(&self) -> ConversionResult<i64> {
        self.validate()?;

        Ok(self.seconds * 1_000 + i64::from(self.nanos) / Self::NANOS_PER_MILLI)
    }

    pub fn to_datetime(&self) -> ConversionResult<DateTime<Utc>> {
        self.validate()?;

        DateTime::from_timestamp(self.seconds, self.nanos as u32).ok_or_else(|| {
            ConversionError::BadTimestamp(format!("{}s {}ns", self.seconds, self.nanos))
        })
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self {
            seconds: value.timestamp(),
            nanos: value.timestamp_subsec_nanos() as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_round_toward_negative_infinity() {
        let timestamp = Timestamp::from_millis(-1).unwrap();
        assert_eq!(timestamp, Timestamp::new(-1, 999_000_000));
        assert_eq!(timestamp.to_millis().unwrap(), -1);
    }

    #[test]
    fn to_millis_truncates_nanos() {
        assert_eq!(Timestamp::new(1, 123_456_789).to_millis().unwrap(), 1_123);
    }

    #[test]
    fn out_of_range_is_rejected() {
        assert!(matches!(
            Timestamp::new(Timestamp::MAX_SECONDS + 1, 0).validate(),
            Err(ConversionError::BadTimestamp(_))
        ));
        assert!(matches!(
            Timestamp::new(0, -1).to_millis(),
            Err(ConversionError::BadTimestamp(_))
        ));
        assert!(matches!(
            Timestamp::from_millis(i64::MIN),
            Err(ConversionError::BadTimestamp(_))
        ));
    }

    #[test]
    fn datetime_conversion() {
        let datetime = DateTime::from_timestamp(1_700_000_000, 42).unwrap();
        let timestamp = Timestamp::from(datetime);
        assert_eq!(timestamp, Timestamp::new(1_700_000_000, 42));
        assert_eq!(timestamp.to_datetime().unwrap(), datetime);
    }
}
