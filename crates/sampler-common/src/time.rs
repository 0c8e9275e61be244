//! Message timestamps.
//!
//! A [`Timestamp`] is the time embedded in a message header by its producer,
//! stored as whole nanoseconds since the producer's epoch. All differences are
//! computed in signed integer nanoseconds so that boundary comparisons are exact.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Message-embedded time with nanosecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The producer epoch.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Build a timestamp from whole seconds and a nanosecond remainder.
    ///
    /// `nsec` values of one second or more carry into `sec`.
    #[must_use]
    pub fn new(sec: u32, nsec: u32) -> Self {
        Self(u64::from(sec) * NANOS_PER_SEC + u64::from(nsec))
    }

    /// Build a timestamp from nanoseconds since the epoch.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Build a timestamp from fractional seconds, rounded to the nearest nanosecond.
    ///
    /// Negative and non-finite inputs clamp to [`Timestamp::ZERO`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // non-negative, saturating float cast
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }
        Self((secs * NANOS_PER_SEC as f64).round() as u64)
    }

    /// Nanoseconds since the epoch.
    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Whole seconds part.
    #[must_use]
    pub const fn sec(&self) -> u64 {
        self.0 / NANOS_PER_SEC
    }

    /// Sub-second nanoseconds part.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // remainder is below one second
    pub const fn nsec(&self) -> u32 {
        (self.0 % NANOS_PER_SEC) as u32
    }

    /// Fractional seconds since the epoch.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    /// Signed nanoseconds from `earlier` to `self`.
    ///
    /// Negative when `earlier` is actually later than `self`.
    #[must_use]
    pub fn nanos_since(&self, earlier: Timestamp) -> i128 {
        i128::from(self.0) - i128::from(earlier.0)
    }

    /// Signed age of `self` as seen at `now`, in fractional seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn age_secs_at(&self, now: Timestamp) -> f64 {
        now.nanos_since(*self) as f64 / NANOS_PER_SEC as f64
    }

    /// Add a duration, saturating at the representable maximum.
    #[must_use]
    pub fn saturating_add(self, d: Duration) -> Self {
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(nanos))
    }

    /// Subtract a duration, saturating at the epoch.
    #[must_use]
    pub fn saturating_sub(self, d: Duration) -> Self {
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_sub(nanos))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec(), self.nsec())
    }
}

impl From<Duration> for Timestamp {
    fn from(since_epoch: Duration) -> Self {
        Self(u64::try_from(since_epoch.as_nanos()).unwrap_or(u64::MAX))
    }
}
