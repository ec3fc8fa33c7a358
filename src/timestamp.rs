//! Version timestamps.
//!
//! A version record's creation date is stored on the wire as a decimal
//! `YYYYMMDDHHMMSS` value (e.g. `20250131120000`), the same convention
//! the reference format uses, rather than a Unix timestamp. [`Timestamp`]
//! keeps that representation as the canonical form and converts to/from
//! [`SystemTime`] for the rest of the crate.
//!
//! # Example
//!
//! ```rust
//! use zpaqrs::Timestamp;
//!
//! let ts = Timestamp::from_decimal(20250131120000).unwrap();
//! assert_eq!(ts.year(), 2025);
//! assert_eq!(ts.as_unix_secs(), 1738325200);
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

const SECS_PER_DAY: i64 = 86_400;
/// Days from the civil epoch (0000-03-01) to 1970-01-01, Howard Hinnant's algorithm.
const EPOCH_ADJUSTMENT_DAYS: i64 = 719_468;

/// A version timestamp, canonically a decimal `YYYYMMDDHHMMSS` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Decimal encoding, e.g. `20250131120000`.
    decimal: u64,
}

impl Timestamp {
    /// Creates a timestamp from its on-wire decimal `YYYYMMDDHHMMSS` form.
    ///
    /// Returns [`Error::BadHeader`] if the value doesn't decode to a
    /// calendar date (month out of `1..=12`, day out of range for that
    /// month, or a time field out of `0..60`).
    pub fn from_decimal(decimal: u64) -> Result<Self> {
        let ts = Self { decimal };
        ts.validate()?;
        Ok(ts)
    }

    fn validate(&self) -> Result<()> {
        let (_year, month, day, hour, minute, second) = self.fields();
        if !(1..=12).contains(&month) {
            return Err(Error::bad_header(format!("month {month} out of range")));
        }
        if day == 0 || day > days_in_month(self.year(), month) {
            return Err(Error::bad_header(format!("day {day} out of range")));
        }
        if hour > 23 || minute > 59 || second > 59 {
            return Err(Error::bad_header(format!(
                "time {hour:02}:{minute:02}:{second:02} out of range"
            )));
        }
        Ok(())
    }

    fn fields(&self) -> (i64, u32, u32, u32, u32, u32) {
        let d = self.decimal;
        let second = (d % 100) as u32;
        let d = d / 100;
        let minute = (d % 100) as u32;
        let d = d / 100;
        let hour = (d % 100) as u32;
        let d = d / 100;
        let day = (d % 100) as u32;
        let d = d / 100;
        let month = (d % 100) as u32;
        let year = (d / 100) as i64;
        (year, month, day, hour, minute, second)
    }

    /// Builds a timestamp from calendar fields.
    pub fn from_ymd_hms(year: i64, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Result<Self> {
        let decimal = (year as u64) * 1_00_00_00_00_00
            + (month as u64) * 1_00_00_00_00
            + (day as u64) * 1_00_00_00
            + (hour as u64) * 1_00_00
            + (minute as u64) * 100
            + second as u64;
        Self::from_decimal(decimal)
    }

    /// Builds a timestamp from a [`SystemTime`], truncated to the second.
    pub fn from_system_time(time: SystemTime) -> Result<Self> {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64),
        };
        Self::from_unix_secs(secs)
    }

    /// Builds a timestamp from Unix seconds.
    pub fn from_unix_secs(secs: i64) -> Result<Self> {
        let days = secs.div_euclid(SECS_PER_DAY);
        let time_of_day = secs.rem_euclid(SECS_PER_DAY);
        let (year, month, day) = civil_from_days(days);
        let hour = (time_of_day / 3600) as u32;
        let minute = ((time_of_day % 3600) / 60) as u32;
        let second = (time_of_day % 60) as u32;
        Self::from_ymd_hms(year, month, day, hour, minute, second)
    }

    /// Returns the raw decimal `YYYYMMDDHHMMSS` encoding.
    #[inline]
    pub const fn as_decimal(&self) -> u64 {
        self.decimal
    }

    /// Returns the calendar year.
    pub fn year(&self) -> i64 {
        self.fields().0
    }

    /// Returns the calendar month, `1..=12`.
    pub fn month(&self) -> u32 {
        self.fields().1
    }

    /// Returns the day of month, `1..=31`.
    pub fn day(&self) -> u32 {
        self.fields().2
    }

    /// Converts to Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        let (year, month, day, hour, minute, second) = self.fields();
        let days = days_from_civil(year, month, day);
        days * SECS_PER_DAY + (hour as i64) * 3600 + (minute as i64) * 60 + second as i64
    }

    /// Converts to a [`SystemTime`].
    pub fn as_system_time(&self) -> SystemTime {
        let secs = self.as_unix_secs();
        if secs >= 0 {
            UNIX_EPOCH + Duration::from_secs(secs as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs((-secs) as u64)
        }
    }
}

impl Default for Timestamp {
    /// Returns the Unix epoch (1970-01-01 00:00:00).
    fn default() -> Self {
        Self::from_decimal(19700101000000).expect("epoch is a valid calendar date")
    }
}

impl TryFrom<u64> for Timestamp {
    type Error = Error;

    fn try_from(decimal: u64) -> Result<Self> {
        Self::from_decimal(decimal)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> u64 {
        ts.decimal
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> SystemTime {
        ts.as_system_time()
    }
}

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// Howard Hinnant's `civil_from_days`: maps a day count (since 1970-01-01)
/// to a proleptic-Gregorian `(year, month, day)` triple.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + EPOCH_ADJUSTMENT_DAYS;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as i64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

/// Inverse of [`civil_from_days`].
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = (if month > 2 { month - 3 } else { month + 9 }) as i64;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - EPOCH_ADJUSTMENT_DAYS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_round_trips() {
        let ts = Timestamp::from_decimal(19700101000000).unwrap();
        assert_eq!(ts.as_unix_secs(), 0);
        assert_eq!(ts.as_system_time(), UNIX_EPOCH);
    }

    #[test]
    fn known_date_matches_unix_seconds() {
        // 2025-01-31 12:00:00 UTC
        let ts = Timestamp::from_decimal(20250131120000).unwrap();
        assert_eq!(ts.year(), 2025);
        assert_eq!(ts.month(), 1);
        assert_eq!(ts.day(), 31);
        assert_eq!(ts.as_unix_secs(), 1_738_324_800);
    }

    #[test]
    fn from_unix_secs_round_trips_through_decimal() {
        let original = Timestamp::from_decimal(20250131120000).unwrap();
        let rebuilt = Timestamp::from_unix_secs(original.as_unix_secs()).unwrap();
        assert_eq!(original, rebuilt);
    }

    #[test]
    fn rejects_invalid_month() {
        let err = Timestamp::from_decimal(20251301000000).unwrap_err();
        assert!(matches!(err, Error::BadHeader(_)));
    }

    #[test]
    fn rejects_day_31_in_february() {
        let err = Timestamp::from_decimal(20250231000000).unwrap_err();
        assert!(matches!(err, Error::BadHeader(_)));
    }

    #[test]
    fn accepts_leap_day() {
        let ts = Timestamp::from_decimal(20240229000000).unwrap();
        assert_eq!(ts.day(), 29);
    }

    #[test]
    fn rejects_second_60() {
        let err = Timestamp::from_decimal(20250131120060).unwrap_err();
        assert!(matches!(err, Error::BadHeader(_)));
    }

    #[test]
    fn default_is_unix_epoch() {
        assert_eq!(Timestamp::default().as_unix_secs(), 0);
    }

    #[test]
    fn pre_epoch_dates_round_trip() {
        let ts = Timestamp::from_ymd_hms(1969, 12, 31, 23, 0, 0).unwrap();
        assert_eq!(ts.as_unix_secs(), -3600);
    }
}
