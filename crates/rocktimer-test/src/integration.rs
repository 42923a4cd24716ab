//! End-to-end Integration Test Suite
//!
//! Drives a coordinator node with encoded datagrams for whole sessions of
//! stones, optionally through a chaos link, and checks:
//! - Records only ever carry splits that some stone really produced
//! - Backfilled splits belong to the same stone as the first split
//! - Snapshot sequence numbers never go backwards
//! - A reliable link loses nothing

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rocktimer_core::{SystemState, TimestampNs};
use rocktimer_runtime::{decode_datagram, NodeConfig, TimerNode};
use rocktimer_state::TimingRecord;
use rocktimer_time::ManualClock;

use crate::chaos::{ChaosConfig, ChaosNetwork};
use crate::simulator::{SheetConfig, SheetSimulator, StonePass};

/// Tolerance for the derived total split, which is a sum of two floats
const TOTAL_EPSILON_MS: f64 = 1e-6;

/// How long before the tee the operator arms
const ARM_LEAD: Duration = Duration::from_secs(1);

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for integration tests
#[derive(Debug, Clone)]
pub struct IntegrationTestConfig {
    /// Number of stones
    pub passes: usize,
    /// Enable chaos
    pub chaos: Option<ChaosConfig>,
    pub sheet: SheetConfig,
    pub seed: u64,
}

impl Default for IntegrationTestConfig {
    fn default() -> Self {
        IntegrationTestConfig {
            passes: 16,
            chaos: None,
            sheet: SheetConfig::default(),
            seed: 1,
        }
    }
}

impl IntegrationTestConfig {
    /// Minimal test configuration
    pub fn minimal() -> Self {
        IntegrationTestConfig {
            passes: 3,
            ..Self::default()
        }
    }

    /// A full end of play over a lossy link
    pub fn lossy() -> Self {
        IntegrationTestConfig {
            passes: 32,
            chaos: Some(ChaosConfig::lossy()),
            ..Self::default()
        }
    }

    /// Stress test configuration
    pub fn hostile() -> Self {
        IntegrationTestConfig {
            passes: 64,
            chaos: Some(ChaosConfig::hostile()),
            ..Self::default()
        }
    }

    /// With chaos enabled
    pub fn with_chaos(mut self, chaos: ChaosConfig) -> Self {
        self.chaos = Some(chaos);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

// ============================================================================
// RESULT
// ============================================================================

/// Result of an integration test
#[derive(Debug, Clone)]
pub struct IntegrationTestResult {
    /// Stones that were thrown
    pub passes: Vec<StonePass>,
    /// Final history, most recent first
    pub records: Vec<TimingRecord>,
    pub datagrams_sent: usize,
    pub datagrams_delivered: usize,
    /// Specific invariant violations
    pub violations: Vec<String>,
}

impl IntegrationTestResult {
    /// Check if the test passed
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Records that also carry the far split
    pub fn complete_records(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.hog_to_hog_ms.is_some())
            .count()
    }
}

// ============================================================================
// HARNESS
// ============================================================================

/// Integration test harness
pub struct IntegrationTestHarness {
    config: IntegrationTestConfig,
    clock: Arc<ManualClock>,
    node: TimerNode,
    network: ChaosNetwork<Vec<u8>>,
    sensor_addr: SocketAddr,
    origin: TimestampNs,
    last_seq: u64,
    datagrams_sent: usize,
    datagrams_delivered: usize,
    violations: Vec<String>,
}

impl IntegrationTestHarness {
    /// Create a new test harness
    pub fn new(config: IntegrationTestConfig) -> Self {
        let clock = Arc::new(ManualClock::at_epoch());
        let node = TimerNode::new(
            NodeConfig {
                liveness_timeout: Duration::from_secs(10),
                local_checkpoint: None,
            },
            clock.clone(),
            None,
        );
        let chaos = config.chaos.clone().unwrap_or_else(ChaosConfig::reliable);
        let network = ChaosNetwork::new(chaos, config.seed);
        let origin = config.sheet.start;

        IntegrationTestHarness {
            config,
            clock,
            node,
            network,
            sensor_addr: SocketAddr::from(([10, 0, 0, 2], 5000)),
            origin,
            last_seq: 0,
            datagrams_sent: 0,
            datagrams_delivered: 0,
            violations: Vec::new(),
        }
    }

    /// Run the integration test
    pub fn run(mut self) -> IntegrationTestResult {
        let passes =
            SheetSimulator::new(self.config.sheet.clone(), self.config.seed).passes(self.config.passes);

        for pass in &passes {
            self.throw(pass);
        }
        let rest = self.network.flush();
        self.deliver(rest);

        let records = self.node.history(usize::MAX);
        self.check_records(&passes, &records);

        IntegrationTestResult {
            passes,
            records,
            datagrams_sent: self.datagrams_sent,
            datagrams_delivered: self.datagrams_delivered,
            violations: self.violations,
        }
    }

    /// Get the node under test
    pub fn node(&self) -> &TimerNode {
        &self.node
    }

    fn throw(&mut self, pass: &StonePass) {
        self.advance_to(self.offset(pass.start).saturating_sub(ARM_LEAD));

        // An operator abandons a stuck run before arming for the next stone
        if self.node.state() == SystemState::Measuring || self.node.state() == SystemState::Armed {
            self.node.disarm();
        }
        if !self.node.arm().success {
            self.violations
                .push(format!("arm refused in {}", self.node.state()));
        }
        self.check_seq();

        for crossing in pass.crossings() {
            self.advance_to(self.offset(crossing.timestamp));
            match crossing.message().encode() {
                Ok(bytes) => {
                    self.network.send(bytes);
                    self.datagrams_sent += 1;
                }
                Err(e) => self.violations.push(format!("encode failed: {}", e)),
            }
        }
    }

    fn offset(&self, timestamp: TimestampNs) -> Duration {
        Duration::from_nanos(timestamp.as_nanos().saturating_sub(self.origin.as_nanos()))
    }

    fn advance_to(&mut self, at: Duration) {
        let now = self.network.current_time();
        if at > now {
            self.clock.advance(at - now);
        }
        let due = self.network.advance_to(at);
        self.deliver(due);
    }

    fn deliver(&mut self, datagrams: Vec<Vec<u8>>) {
        for bytes in datagrams {
            self.datagrams_delivered += 1;
            if let Some(inbound) = decode_datagram(&bytes, self.sensor_addr) {
                self.node.ingest(inbound);
            } else {
                self.violations.push("well-formed datagram rejected".to_string());
            }
            self.check_seq();
        }
    }

    fn check_seq(&mut self) {
        let seq = self.node.hub().latest().seq;
        if seq < self.last_seq {
            self.violations
                .push(format!("snapshot seq went back from {} to {}", self.last_seq, seq));
        }
        self.last_seq = seq;
    }

    fn check_records(&mut self, passes: &[StonePass], records: &[TimingRecord]) {
        if records.len() > passes.len() {
            self.violations.push(format!(
                "{} records for {} stones",
                records.len(),
                passes.len()
            ));
        }

        for pair in records.windows(2) {
            if pair[0].id <= pair[1].id {
                self.violations
                    .push(format!("history out of order: {} before {}", pair[0].id, pair[1].id));
            }
        }

        for record in records {
            let Some(pass) = passes
                .iter()
                .find(|p| p.first_split_ms() == record.tee_to_hog_close_ms)
            else {
                self.violations.push(format!(
                    "record {} has split {} no stone produced",
                    record.id, record.tee_to_hog_close_ms
                ));
                continue;
            };

            if let Some(hog_to_hog) = record.hog_to_hog_ms {
                if pass.second_split_ms() != Some(hog_to_hog) {
                    self.violations.push(format!(
                        "record {} far split {} belongs to another stone",
                        record.id, hog_to_hog
                    ));
                }
                let expected_total = pass.first_split_ms() + hog_to_hog;
                match record.total_ms {
                    Some(total) if (total - expected_total).abs() < TOTAL_EPSILON_MS => {}
                    other => self.violations.push(format!(
                        "record {} total {:?}, expected {}",
                        record.id, other, expected_total
                    )),
                }
            }
        }

        if self.config.chaos.is_none() {
            if records.len() != passes.len() {
                self.violations.push(format!(
                    "reliable link: {} records for {} stones",
                    records.len(),
                    passes.len()
                ));
            }
            let expected_far = passes.iter().filter(|p| p.hog_to_hog.is_some()).count();
            let got_far = records.iter().filter(|r| r.hog_to_hog_ms.is_some()).count();
            if expected_far != got_far {
                self.violations.push(format!(
                    "reliable link: {} far splits, expected {}",
                    got_far, expected_far
                ));
            }
        }
    }
}

// ============================================================================
// CANNED RUNS
// ============================================================================

/// A few stones over a perfect link
pub fn test_clean_session() -> IntegrationTestResult {
    IntegrationTestHarness::new(IntegrationTestConfig::minimal()).run()
}

/// An end of play over sheet-side WiFi
pub fn test_lossy_session() -> IntegrationTestResult {
    IntegrationTestHarness::new(IntegrationTestConfig::lossy()).run()
}

/// Many stones over a link that loses, holds and duplicates aggressively
pub fn test_hostile_session() -> IntegrationTestResult {
    IntegrationTestHarness::new(IntegrationTestConfig::hostile()).run()
}
