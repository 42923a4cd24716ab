//! Time primitives for RockTimer
//!
//! Checkpoint timestamps are sender-local nanoseconds. No skew correction
//! is applied between senders; splits are plain differences.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Nanoseconds per millisecond, as f64 for split arithmetic
pub const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Sender-local timestamp in nanoseconds
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimestampNs(pub u64);

impl TimestampNs {
    pub const ZERO: TimestampNs = TimestampNs(0);

    #[inline]
    pub fn from_nanos(nanos: u64) -> Self {
        TimestampNs(nanos)
    }

    #[inline]
    pub fn as_nanos(self) -> u64 {
        self.0
    }

    /// Split in milliseconds from `earlier` to `self`.
    /// Negative when `self` precedes `earlier`.
    #[inline]
    pub fn split_ms_since(self, earlier: TimestampNs) -> f64 {
        (self.0 as i128 - earlier.0 as i128) as f64 / NANOS_PER_MILLI
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        TimestampNs(self.0.saturating_add(nanos))
    }
}

impl fmt::Debug for TimestampNs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Split between two optional timestamps, defined only when both are present
#[inline]
pub fn split_ms(earlier: Option<TimestampNs>, later: Option<TimestampNs>) -> Option<f64> {
    match (earlier, later) {
        (Some(earlier), Some(later)) => Some(later.split_ms_since(earlier)),
        _ => None,
    }
}
