//! Clock implementations for RockTimer
//!
//! Three readings are needed:
//! - wall clock, for session start and record creation times
//! - sender-local nanoseconds, stamped by the local sensor at capture
//! - monotonic elapsed time, for liveness ages

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use rocktimer_core::TimestampNs;

/// Time source shared by the coordinator, the liveness tracker and local sensors
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn now_wall(&self) -> DateTime<Utc>;

    /// Capture timestamp for a locally attached sensor
    fn now_ns(&self) -> TimestampNs;

    /// Monotonic time since the clock was created.
    /// INVARIANT: never decreases
    fn monotonic(&self) -> Duration;
}

/// Real clock backed by the OS
pub struct SystemClock {
    reference: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            reference: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_wall(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_ns(&self) -> TimestampNs {
        // Remote sensors stamp epoch nanoseconds; the local sensor must share that base
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        TimestampNs::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    fn monotonic(&self) -> Duration {
        self.reference.elapsed()
    }
}

/// Manually advanced clock for tests and simulation
pub struct ManualClock {
    inner: Mutex<ManualInner>,
}

struct ManualInner {
    wall: DateTime<Utc>,
    nanos: TimestampNs,
    elapsed: Duration,
}

impl ManualClock {
    /// Create a clock frozen at the given wall time
    pub fn new(wall: DateTime<Utc>) -> Self {
        let nanos = wall
            .timestamp_nanos_opt()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);
        ManualClock {
            inner: Mutex::new(ManualInner {
                wall,
                nanos: TimestampNs::from_nanos(nanos),
                elapsed: Duration::ZERO,
            }),
        }
    }

    /// Clock frozen at the Unix epoch
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::default())
    }

    /// Advance every reading by `dt`
    pub fn advance(&self, dt: Duration) {
        let mut inner = self.inner.lock();
        inner.wall += chrono::Duration::from_std(dt).unwrap_or(chrono::Duration::zero());
        inner.nanos = inner.nanos.saturating_add(dt);
        inner.elapsed += dt;
    }

    /// Override the nanosecond reading only
    pub fn set_ns(&self, nanos: TimestampNs) {
        self.inner.lock().nanos = nanos;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at_epoch()
    }
}

impl Clock for ManualClock {
    fn now_wall(&self) -> DateTime<Utc> {
        self.inner.lock().wall
    }

    fn now_ns(&self) -> TimestampNs {
        self.inner.lock().nanos
    }

    fn monotonic(&self) -> Duration {
        self.inner.lock().elapsed
    }
}
