//! RockTimer Node - Coordinator host
//!
//! All mutation of measurement state and liveness goes through one lock.
//! Snapshots are taken under that lock and published after it is released,
//! so observers never hold it and never see a torn state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use rocktimer_core::{CheckpointId, CommandResult, RecordId, SystemState};
use rocktimer_state::{
    Announcement, CoordinatorStats, MeasurementCoordinator, SessionView, TimingRecord,
    TriggerOutcome,
};
use rocktimer_time::{Clock, LivenessStatus, LivenessTracker, SensorStatus};

use crate::{AnnouncementSender, HubStats, Inbound, ObserverHub, ServerConfig, StateSnapshot, Subscription};

/// Node configuration
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Age after which a remote sensor is reported offline
    pub liveness_timeout: Duration,
    /// Checkpoint wired to this host
    pub local_checkpoint: Option<CheckpointId>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            liveness_timeout: Duration::from_secs(10),
            local_checkpoint: Some(CheckpointId::HogClose),
        }
    }
}

impl From<&ServerConfig> for NodeConfig {
    fn from(config: &ServerConfig) -> Self {
        NodeConfig {
            liveness_timeout: config.liveness_timeout,
            local_checkpoint: config.local_checkpoint,
        }
    }
}

/// Node statistics
#[derive(Clone, Debug, Default)]
pub struct NodeStats {
    pub messages_in: u64,
    pub heartbeats: u64,
    pub triggers: u64,
    pub snapshots: u64,
    pub announcements_dropped: u64,
    pub coordinator: CoordinatorStats,
    pub hub: HubStats,
}

struct NodeInner {
    coordinator: MeasurementCoordinator,
    liveness: LivenessTracker,
    /// Sequence of the last snapshot taken
    seq: u64,
    /// Liveness as of the last snapshot
    last_liveness: BTreeMap<CheckpointId, LivenessStatus>,
    messages_in: u64,
    heartbeats: u64,
    triggers: u64,
}

impl NodeInner {
    fn view(&self, timeout: Duration) -> StateSnapshot {
        StateSnapshot {
            seq: self.seq,
            state: self.coordinator.state(),
            session: self.coordinator.session().view(),
            sensors: self.liveness.status(timeout),
        }
    }

    fn next_snapshot(&mut self, timeout: Duration) -> StateSnapshot {
        self.seq += 1;
        let snapshot = self.view(timeout);
        self.last_liveness = snapshot
            .sensors
            .iter()
            .map(|(&checkpoint, view)| (checkpoint, view.status))
            .collect();
        snapshot
    }

    fn liveness_changed(&self, timeout: Duration) -> bool {
        self.liveness.status_map(timeout) != self.last_liveness
    }
}

/// Coordinator host shared by ingress, control surface and tickers
pub struct TimerNode {
    inner: Mutex<NodeInner>,
    hub: ObserverHub,
    announcements: Option<AnnouncementSender>,
    config: NodeConfig,
    announcements_dropped: AtomicU64,
}

impl TimerNode {
    /// Create a node; `announcements` is the queue drained by the announcer task
    pub fn new(
        config: NodeConfig,
        clock: Arc<dyn Clock>,
        announcements: Option<AnnouncementSender>,
    ) -> Self {
        let coordinator = MeasurementCoordinator::new(Arc::clone(&clock));
        let liveness = LivenessTracker::new(clock, config.local_checkpoint);
        let last_liveness = liveness.status_map(config.liveness_timeout);

        let inner = NodeInner {
            coordinator,
            liveness,
            seq: 0,
            last_liveness,
            messages_in: 0,
            heartbeats: 0,
            triggers: 0,
        };
        let hub = ObserverHub::new(inner.view(config.liveness_timeout));

        TimerNode {
            inner: Mutex::new(inner),
            hub,
            announcements,
            config,
            announcements_dropped: AtomicU64::new(0),
        }
    }

    /// Get node configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Apply one inbound message.
    /// Returns the admission outcome for triggers, `None` for heartbeats.
    pub fn ingest(&self, inbound: Inbound) -> Option<TriggerOutcome> {
        let timeout = self.config.liveness_timeout;
        let Inbound { message, source } = inbound;

        let (outcome, snapshot, announcements) = {
            let mut inner = self.inner.lock();
            inner.messages_in += 1;

            // Stage 1: liveness for every parsed message, trigger or not
            inner
                .liveness
                .mark_seen(message.device_id(), source, message.kind());

            // Stage 2: admission
            let outcome = match message.into_event(source) {
                Some(event) => {
                    inner.triggers += 1;
                    Some(inner.coordinator.handle_trigger(&event))
                }
                None => {
                    inner.heartbeats += 1;
                    None
                }
            };

            // Stage 3: snapshot if anything observable changed
            let accepted = outcome.is_some_and(|o| o.is_accepted());
            let snapshot = (accepted || inner.liveness_changed(timeout))
                .then(|| inner.next_snapshot(timeout));

            (outcome, snapshot, inner.coordinator.drain_announcements())
        };

        // Stage 4: publish and announce outside the lock
        self.finish(snapshot, announcements);
        outcome
    }

    /// Arm for a new run
    pub fn arm(&self) -> CommandResult {
        self.command(MeasurementCoordinator::arm)
    }

    /// Abandon the current run
    pub fn disarm(&self) -> CommandResult {
        self.command(MeasurementCoordinator::disarm)
    }

    fn command(&self, apply: fn(&mut MeasurementCoordinator) -> CommandResult) -> CommandResult {
        let timeout = self.config.liveness_timeout;

        let (result, snapshot, announcements) = {
            let mut inner = self.inner.lock();
            let result = apply(&mut inner.coordinator);
            let snapshot = result.success.then(|| inner.next_snapshot(timeout));
            (result, snapshot, inner.coordinator.drain_announcements())
        };

        self.finish(snapshot, announcements);
        result
    }

    /// Publish a snapshot if any sensor changed liveness status since the last one
    pub fn publish_liveness_if_changed(&self) -> bool {
        let timeout = self.config.liveness_timeout;

        let snapshot = {
            let mut inner = self.inner.lock();
            if !inner.liveness_changed(timeout) {
                return false;
            }
            inner.next_snapshot(timeout)
        };

        tracing::debug!(seq = snapshot.seq, "liveness changed");
        self.finish(Some(snapshot), Vec::new());
        true
    }

    fn finish(&self, snapshot: Option<StateSnapshot>, announcements: Vec<Announcement>) {
        if let Some(snapshot) = snapshot {
            self.hub.publish(snapshot);
        }
        for announcement in announcements {
            self.announce(announcement);
        }
    }

    fn announce(&self, announcement: Announcement) {
        let Some(tx) = &self.announcements else {
            return;
        };
        match tx.try_send(announcement) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                self.announcements_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(?dropped, "announcement queue full, dropping");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("announcement queue closed");
            }
        }
    }

    /// Current state snapshot, without publishing
    pub fn snapshot(&self) -> StateSnapshot {
        self.inner.lock().view(self.config.liveness_timeout)
    }

    pub fn state(&self) -> SystemState {
        self.inner.lock().coordinator.state()
    }

    /// Current session with derived splits
    pub fn current(&self) -> SessionView {
        self.inner.lock().coordinator.session().view()
    }

    /// Up to `limit` most recent records
    pub fn history(&self, limit: usize) -> Vec<TimingRecord> {
        self.inner.lock().coordinator.history().list(limit)
    }

    pub fn delete_record(&self, id: RecordId) -> bool {
        let deleted = self.inner.lock().coordinator.history_mut().delete(id);
        if deleted {
            tracing::info!(record = %id, "record deleted");
        }
        deleted
    }

    pub fn clear_history(&self) {
        self.inner.lock().coordinator.history_mut().clear();
        tracing::info!("history cleared");
    }

    /// Liveness of every checkpoint
    pub fn sensors(&self) -> BTreeMap<CheckpointId, SensorStatus> {
        self.inner
            .lock()
            .liveness
            .status(self.config.liveness_timeout)
    }

    /// Register an observer
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    /// Get observer hub
    pub fn hub(&self) -> &ObserverHub {
        &self.hub
    }

    pub fn stats(&self) -> NodeStats {
        let inner = self.inner.lock();
        NodeStats {
            messages_in: inner.messages_in,
            heartbeats: inner.heartbeats,
            triggers: inner.triggers,
            snapshots: inner.seq,
            announcements_dropped: self.announcements_dropped.load(Ordering::Relaxed),
            coordinator: inner.coordinator.stats().clone(),
            hub: self.hub.stats(),
        }
    }
}

/// Periodically publish liveness transitions (a sensor going quiet produces no message)
pub fn spawn_liveness_ticker(node: Arc<TimerNode>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            node.publish_liveness_if_changed();
        }
    })
}
