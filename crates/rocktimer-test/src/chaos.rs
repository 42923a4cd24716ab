//! Chaos delivery for sensor datagrams
//!
//! Simulates a hostile link between sensors and the coordinator:
//! - Latency with uniform jitter
//! - Random and burst loss
//! - Reordering (held back behind later packets)
//! - Duplication

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Link chaos configuration
#[derive(Clone, Debug)]
pub struct ChaosConfig {
    /// Base latency
    pub base_latency: Duration,
    /// Jitter range added to the base latency, milliseconds
    pub jitter_ms: (u64, u64),
    /// Packet loss rate (0.0 - 1.0)
    pub loss_rate: f64,
    /// Probability that a loss starts a burst
    pub burst_loss_prob: f64,
    /// Burst loss length range
    pub burst_length: (u32, u32),
    /// Reorder probability
    pub reorder_prob: f64,
    /// How long a reordered packet is held back
    pub reorder_hold: Duration,
    /// Duplicate probability
    pub duplicate_prob: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(2),
            jitter_ms: (0, 5),
            loss_rate: 0.02,
            burst_loss_prob: 0.05,
            burst_length: (2, 4),
            reorder_prob: 0.05,
            reorder_hold: Duration::from_millis(50),
            duplicate_prob: 0.05,
        }
    }
}

impl ChaosConfig {
    /// Lossless, in-order link
    pub fn reliable() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(1),
            jitter_ms: (0, 0),
            loss_rate: 0.0,
            burst_loss_prob: 0.0,
            burst_length: (0, 0),
            reorder_prob: 0.0,
            reorder_hold: Duration::ZERO,
            duplicate_prob: 0.0,
        }
    }

    /// Sheet-side WiFi on a busy night
    pub fn lossy() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(5),
            jitter_ms: (0, 30),
            loss_rate: 0.10,
            burst_loss_prob: 0.05,
            burst_length: (2, 6),
            reorder_prob: 0.10,
            reorder_hold: Duration::from_millis(200),
            duplicate_prob: 0.10,
        }
    }

    /// Everything goes wrong, including long holds past the next checkpoint
    pub fn hostile() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(20),
            jitter_ms: (0, 200),
            loss_rate: 0.25,
            burst_loss_prob: 0.10,
            burst_length: (3, 8),
            reorder_prob: 0.30,
            reorder_hold: Duration::from_secs(5),
            duplicate_prob: 0.30,
        }
    }
}

/// Packet in flight
#[derive(Clone, Debug)]
pub struct ChaosPacket<T> {
    pub payload: T,
    /// Scheduled delivery time (relative to start)
    pub delivery_time: Duration,
    /// Original send time
    pub send_time: Duration,
    /// Send order, shared by duplicates
    pub seq: u64,
}

/// Chaos link statistics
#[derive(Clone, Debug, Default)]
pub struct ChaosStats {
    pub packets_sent: u64,
    pub packets_delivered: u64,
    pub packets_lost: u64,
    pub packets_reordered: u64,
    pub packets_duplicated: u64,
    pub max_latency_ms: u64,
}

impl ChaosStats {
    pub fn loss_rate(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            self.packets_lost as f64 / self.packets_sent as f64
        }
    }
}

/// Seeded chaos link carrying any payload
pub struct ChaosNetwork<T> {
    config: ChaosConfig,
    rng: StdRng,
    in_flight: Vec<ChaosPacket<T>>,
    current_time: Duration,
    burst_remaining: u32,
    next_seq: u64,
    stats: ChaosStats,
}

impl<T: Clone> ChaosNetwork<T> {
    /// Create a new chaos link with seed
    pub fn new(config: ChaosConfig, seed: u64) -> Self {
        ChaosNetwork {
            config,
            rng: StdRng::seed_from_u64(seed),
            in_flight: Vec::new(),
            current_time: Duration::ZERO,
            burst_remaining: 0,
            next_seq: 0,
            stats: ChaosStats::default(),
        }
    }

    /// Send a payload at the current time
    pub fn send(&mut self, payload: T) {
        self.stats.packets_sent += 1;
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.should_drop() {
            self.stats.packets_lost += 1;
            return;
        }

        let mut delivery_time = self.current_time + self.latency();
        if self.config.reorder_prob > 0.0 && self.rng.gen::<f64>() < self.config.reorder_prob {
            delivery_time += self.config.reorder_hold;
            self.stats.packets_reordered += 1;
        }

        if self.config.duplicate_prob > 0.0 && self.rng.gen::<f64>() < self.config.duplicate_prob {
            let duplicate_time = delivery_time + self.latency();
            self.in_flight.push(ChaosPacket {
                payload: payload.clone(),
                delivery_time: duplicate_time,
                send_time: self.current_time,
                seq,
            });
            self.stats.packets_duplicated += 1;
        }

        self.in_flight.push(ChaosPacket {
            payload,
            delivery_time,
            send_time: self.current_time,
            seq,
        });
    }

    fn latency(&mut self) -> Duration {
        let (min, max) = self.config.jitter_ms;
        let jitter = if max > min {
            self.rng.gen_range(min..=max)
        } else {
            min
        };
        self.config.base_latency + Duration::from_millis(jitter)
    }

    fn should_drop(&mut self) -> bool {
        if self.burst_remaining > 0 {
            self.burst_remaining -= 1;
            return true;
        }

        if self.config.loss_rate <= 0.0 || self.rng.gen::<f64>() >= self.config.loss_rate {
            return false;
        }

        // This loss may start a burst
        let (min, max) = self.config.burst_length;
        if max > 0 && self.rng.gen::<f64>() < self.config.burst_loss_prob {
            self.burst_remaining = self.rng.gen_range(min..=max);
        }
        true
    }

    /// Advance time and return everything due, in delivery order
    pub fn tick(&mut self, dt: Duration) -> Vec<T> {
        self.advance_to(self.current_time + dt)
    }

    /// Advance to an absolute time; never moves backwards
    pub fn advance_to(&mut self, time: Duration) -> Vec<T> {
        self.current_time = self.current_time.max(time);
        let now = self.current_time;

        let mut due: Vec<ChaosPacket<T>> = Vec::new();
        let mut index = 0;
        while index < self.in_flight.len() {
            if self.in_flight[index].delivery_time <= now {
                due.push(self.in_flight.swap_remove(index));
            } else {
                index += 1;
            }
        }
        due.sort_by_key(|packet| (packet.delivery_time, packet.seq));

        for packet in &due {
            let latency = (packet.delivery_time - packet.send_time).as_millis() as u64;
            self.stats.packets_delivered += 1;
            self.stats.max_latency_ms = self.stats.max_latency_ms.max(latency);
        }
        due.into_iter().map(|packet| packet.payload).collect()
    }

    /// Deliver everything still in flight
    pub fn flush(&mut self) -> Vec<T> {
        let last = self
            .in_flight
            .iter()
            .map(|packet| packet.delivery_time)
            .max()
            .unwrap_or(self.current_time);
        self.advance_to(last)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Get current statistics
    pub fn stats(&self) -> &ChaosStats {
        &self.stats
    }

    /// Get current time
    pub fn current_time(&self) -> Duration {
        self.current_time
    }
}
