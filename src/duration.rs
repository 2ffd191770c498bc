//! Expiry durations.
//!
//! A [`Duration`] is a time unit plus an amount, with a distinguished
//! [`Duration::ETERNAL`] value meaning "never expires". Unlike
//! [`std::time::Duration`] it keeps the unit it was built with, carries the
//! eternal marker, and refuses sub-millisecond units because cache expiry is
//! tracked in milliseconds.
//!
//! ```
//! use cache_api::duration::{Duration, TimeUnit};
//!
//! let five = Duration::new(TimeUnit::Minutes, 5).unwrap();
//! assert_eq!(five, Duration::FIVE_MINUTES);
//! assert_eq!(five.adjusted_time(1_000), 1_000 + 300_000);
//! assert!(Duration::ETERNAL.is_eternal());
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Unit of a [`Duration`] amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert `amount` of this unit to whole milliseconds, saturating at
    /// `u64::MAX`.
    pub fn to_millis(self, amount: u64) -> u64 {
        match self {
            TimeUnit::Nanoseconds => amount / 1_000_000,
            TimeUnit::Microseconds => amount / 1_000,
            TimeUnit::Milliseconds => amount,
            TimeUnit::Seconds => amount.saturating_mul(1_000),
            TimeUnit::Minutes => amount.saturating_mul(60_000),
            TimeUnit::Hours => amount.saturating_mul(3_600_000),
            TimeUnit::Days => amount.saturating_mul(86_400_000),
        }
    }

    fn is_sub_millisecond(self) -> bool {
        matches!(self, TimeUnit::Nanoseconds | TimeUnit::Microseconds)
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        };
        f.write_str(name)
    }
}

/// Unvalidated wire form of a [`Duration`].
#[derive(Serialize, Deserialize)]
struct RawDuration {
    time_unit: Option<TimeUnit>,
    amount: u64,
}

/// A length of time used by expiry policies.
///
/// Two durations are equal when both are eternal or when both have a unit
/// and the same length in milliseconds, so `1 minute == 60 seconds`.
/// [`Duration::ZERO`] is not eternal.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawDuration", into = "RawDuration")]
pub struct Duration {
    time_unit: Option<TimeUnit>,
    amount: u64,
}

impl Duration {
    /// Never expires.
    pub const ETERNAL: Duration = Duration {
        time_unit: None,
        amount: 0,
    };

    /// Expires immediately.
    pub const ZERO: Duration = Duration::of(TimeUnit::Seconds, 0);

    pub const ONE_DAY: Duration = Duration::of(TimeUnit::Days, 1);
    pub const ONE_HOUR: Duration = Duration::of(TimeUnit::Hours, 1);
    pub const THIRTY_MINUTES: Duration = Duration::of(TimeUnit::Minutes, 30);
    pub const TWENTY_MINUTES: Duration = Duration::of(TimeUnit::Minutes, 20);
    pub const TEN_MINUTES: Duration = Duration::of(TimeUnit::Minutes, 10);
    pub const FIVE_MINUTES: Duration = Duration::of(TimeUnit::Minutes, 5);
    pub const ONE_MINUTE: Duration = Duration::of(TimeUnit::Minutes, 1);

    const fn of(time_unit: TimeUnit, amount: u64) -> Self {
        Duration {
            time_unit: Some(time_unit),
            amount,
        }
    }

    /// Build a duration of `amount` units.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` for nanosecond and microsecond units.
    pub fn new(time_unit: TimeUnit, amount: u64) -> Result<Self> {
        if time_unit.is_sub_millisecond() {
            return Err(Error::InvalidArgument(format!(
                "Must specify a TimeUnit of milliseconds or higher, got {:?}",
                time_unit
            )));
        }
        Ok(Duration::of(time_unit, amount))
    }

    /// Duration between two millisecond timestamps.
    ///
    /// Either bound being `u64::MAX` yields [`Duration::ETERNAL`].
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` when `end_ms` is before `start_ms`.
    pub fn between(start_ms: u64, end_ms: u64) -> Result<Self> {
        if start_ms == u64::MAX || end_ms == u64::MAX {
            return Ok(Duration::ETERNAL);
        }
        if end_ms < start_ms {
            return Err(Error::InvalidArgument(format!(
                "Cannot specify a duration that ends ({}) before it starts ({})",
                end_ms, start_ms
            )));
        }
        Ok(Duration::of(TimeUnit::Milliseconds, end_ms - start_ms))
    }

    /// Convert a standard duration, rounding down to whole milliseconds.
    pub fn from_std(duration: std::time::Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Duration::of(TimeUnit::Milliseconds, millis)
    }

    /// Unit the duration was built with; `None` when eternal.
    pub fn time_unit(&self) -> Option<TimeUnit> {
        self.time_unit
    }

    /// Amount of [`Self::time_unit`].
    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn is_eternal(&self) -> bool {
        self.time_unit.is_none()
    }

    pub fn is_zero(&self) -> bool {
        self.time_unit.is_some() && self.amount == 0
    }

    /// Length in milliseconds; `None` when eternal.
    pub fn as_millis(&self) -> Option<u64> {
        self.time_unit.map(|unit| unit.to_millis(self.amount))
    }

    /// Absolute expiry time for an entry touched at `now_ms`.
    ///
    /// Returns `u64::MAX` for eternal durations and saturates on overflow.
    pub fn adjusted_time(&self, now_ms: u64) -> u64 {
        match self.as_millis() {
            None => u64::MAX,
            Some(millis) => now_ms.saturating_add(millis),
        }
    }

    /// Equivalent standard duration; `None` when eternal.
    pub fn to_std(&self) -> Option<std::time::Duration> {
        self.as_millis().map(std::time::Duration::from_millis)
    }
}

impl Default for Duration {
    fn default() -> Self {
        Duration::ETERNAL
    }
}

impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_millis(), other.as_millis()) {
            (None, None) => self.amount == other.amount,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Duration {}

impl Hash for Duration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.as_millis() {
            None => state.write_u8(0),
            Some(millis) => {
                state.write_u8(1);
                state.write_u64(millis);
            }
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time_unit {
            None => f.write_str("ETERNAL"),
            Some(unit) => write!(f, "{}{}", self.amount, unit),
        }
    }
}

impl TryFrom<RawDuration> for Duration {
    type Error = Error;

    fn try_from(raw: RawDuration) -> Result<Self> {
        match raw.time_unit {
            Some(unit) => Duration::new(unit, raw.amount),
            None if raw.amount == 0 => Ok(Duration::ETERNAL),
            None => Err(Error::InvalidArgument(
                "Duration without a time unit must have amount 0".to_string(),
            )),
        }
    }
}

impl From<Duration> for RawDuration {
    fn from(d: Duration) -> Self {
        RawDuration {
            time_unit: d.time_unit,
            amount: d.amount,
        }
    }
}
