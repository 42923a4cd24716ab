//! Stone-pass simulation
//!
//! Generates the beam breaks a delivered stone produces, stamped with the
//! sender-local clocks of each checkpoint. All sensors are assumed to share
//! a synchronized clock, so the stamps are directly comparable.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rocktimer_core::{CheckpointId, TimestampNs, NANOS_PER_MILLI};
use rocktimer_wire::WireMessage;

/// Typical tee to near hog line range
pub const TEE_HOG_RANGE: (Duration, Duration) =
    (Duration::from_millis(2_800), Duration::from_millis(3_300));

/// Typical hog to hog range
pub const HOG_HOG_RANGE: (Duration, Duration) =
    (Duration::from_millis(8_000), Duration::from_millis(14_000));

/// One beam break
#[derive(Clone, Debug, PartialEq)]
pub struct Crossing {
    pub checkpoint: CheckpointId,
    pub timestamp: TimestampNs,
}

impl Crossing {
    /// Wire message a sensor would send for this crossing
    pub fn message(&self) -> WireMessage {
        WireMessage::trigger(self.checkpoint.as_str(), self.timestamp)
    }
}

/// A single delivered stone
#[derive(Clone, Debug, PartialEq)]
pub struct StonePass {
    /// Back-line tee crossing
    pub start: TimestampNs,
    pub tee_to_hog_close: Duration,
    /// `None` if the stone stopped short of the far hog line
    pub hog_to_hog: Option<Duration>,
}

impl StonePass {
    pub fn new(start: TimestampNs, tee_to_hog_close: Duration, hog_to_hog: Option<Duration>) -> Self {
        StonePass {
            start,
            tee_to_hog_close,
            hog_to_hog,
        }
    }

    /// Crossings in traversal order
    pub fn crossings(&self) -> Vec<Crossing> {
        let hog_close = self.start.saturating_add(self.tee_to_hog_close);
        let mut crossings = vec![
            Crossing {
                checkpoint: CheckpointId::Tee,
                timestamp: self.start,
            },
            Crossing {
                checkpoint: CheckpointId::HogClose,
                timestamp: hog_close,
            },
        ];
        if let Some(hog_to_hog) = self.hog_to_hog {
            crossings.push(Crossing {
                checkpoint: CheckpointId::HogFar,
                timestamp: hog_close.saturating_add(hog_to_hog),
            });
        }
        crossings
    }

    /// Expected tee to near hog split, milliseconds
    pub fn first_split_ms(&self) -> f64 {
        duration_ms(self.tee_to_hog_close)
    }

    /// Expected hog to hog split, milliseconds
    pub fn second_split_ms(&self) -> Option<f64> {
        self.hog_to_hog.map(duration_ms)
    }

    /// Time from the tee to the last crossing
    pub fn duration(&self) -> Duration {
        self.tee_to_hog_close + self.hog_to_hog.unwrap_or_default()
    }
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / NANOS_PER_MILLI
}

/// Simulator configuration
#[derive(Clone, Debug)]
pub struct SheetConfig {
    /// First stone's tee crossing
    pub start: TimestampNs,
    /// Idle time between one stone's last crossing and the next stone's tee
    pub gap: Duration,
    /// Share of stones that never reach the far hog line
    pub short_ratio: f64,
}

impl Default for SheetConfig {
    fn default() -> Self {
        SheetConfig {
            start: TimestampNs::from_nanos(1_700_000_000_000_000_000),
            gap: Duration::from_secs(20),
            short_ratio: 0.2,
        }
    }
}

/// Seeded generator of consecutive stone passes on one sheet
pub struct SheetSimulator {
    config: SheetConfig,
    rng: StdRng,
    next_start: TimestampNs,
}

impl SheetSimulator {
    pub fn new(config: SheetConfig, seed: u64) -> Self {
        let next_start = config.start;
        SheetSimulator {
            config,
            rng: StdRng::seed_from_u64(seed),
            next_start,
        }
    }

    /// Next stone, with timings drawn from the typical ranges
    pub fn next_pass(&mut self) -> StonePass {
        let tee_to_hog_close = self.sample(TEE_HOG_RANGE);
        let hog_to_hog = if self.rng.gen::<f64>() < self.config.short_ratio {
            None
        } else {
            Some(self.sample(HOG_HOG_RANGE))
        };

        let pass = StonePass::new(self.next_start, tee_to_hog_close, hog_to_hog);
        self.next_start = self
            .next_start
            .saturating_add(pass.duration() + self.config.gap);
        pass
    }

    /// `count` consecutive stones
    pub fn passes(&mut self, count: usize) -> Vec<StonePass> {
        (0..count).map(|_| self.next_pass()).collect()
    }

    fn sample(&mut self, (min, max): (Duration, Duration)) -> Duration {
        let micros = self
            .rng
            .gen_range(min.as_micros() as u64..=max.as_micros() as u64);
        Duration::from_micros(micros)
    }
}
