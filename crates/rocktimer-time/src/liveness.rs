//! Liveness tracking for checkpoint senders
//!
//! Every parsed inbound message refreshes the entry for its device
//! identity, independent of measurement state. Status is derived on read
//! from the entry age and a caller-supplied timeout.
//!
//! Known checkpoints have a fixed slot each. Unrecognized identities are
//! kept in a small side table that evicts its stalest entry when full.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use rocktimer_core::{CheckpointId, MessageKind, Source};

use crate::Clock;

/// Unrecognized identities retained at once
pub const MAX_UNRECOGNIZED: usize = 16;

/// Reachability of a single checkpoint sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessStatus {
    /// Heard from within the timeout
    Online,
    /// Heard from before, but not within the timeout
    Offline,
    /// Remote sender never heard from
    Unknown,
    /// Locally attached sensor that is not currently reporting.
    /// It never sends heartbeats, so silence is not a fault.
    Local,
}

/// Last observation of a sender
#[derive(Clone, Debug)]
pub struct LivenessEntry {
    /// Wall-clock receipt time
    pub last_seen: DateTime<Utc>,
    /// Last sender address (`None` for the local sensor)
    pub address: Option<SocketAddr>,
    /// Kind of the last message
    pub kind: MessageKind,
    /// Monotonic receipt time, for age computation
    seen_at: Duration,
}

/// Status view of one checkpoint, as exposed to observers
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensorStatus {
    pub status: LivenessStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub age_ms: Option<u64>,
    pub address: Option<String>,
    pub last_kind: Option<MessageKind>,
}

/// Liveness tracker across all senders
pub struct LivenessTracker {
    /// One entry per known checkpoint
    known: BTreeMap<CheckpointId, LivenessEntry>,
    /// Identities outside the known set, at most `MAX_UNRECOGNIZED`
    unrecognized: HashMap<String, LivenessEntry>,
    /// Checkpoint wired to this host, if any
    local_checkpoint: Option<CheckpointId>,
    clock: Arc<dyn Clock>,
}

impl LivenessTracker {
    pub fn new(clock: Arc<dyn Clock>, local_checkpoint: Option<CheckpointId>) -> Self {
        LivenessTracker {
            known: BTreeMap::new(),
            unrecognized: HashMap::new(),
            local_checkpoint,
            clock,
        }
    }

    /// Record that a message was received. Always succeeds, overwrites prior entry.
    pub fn mark_seen(&mut self, device_id: &str, source: Source, kind: MessageKind) {
        let entry = LivenessEntry {
            last_seen: self.clock.now_wall(),
            address: source.addr(),
            kind,
            seen_at: self.clock.monotonic(),
        };

        match CheckpointId::parse(device_id) {
            Some(checkpoint) => {
                self.known.insert(checkpoint, entry);
            }
            None => self.mark_unrecognized(device_id, entry),
        }
    }

    fn mark_unrecognized(&mut self, device_id: &str, entry: LivenessEntry) {
        if let Some(existing) = self.unrecognized.get_mut(device_id) {
            *existing = entry;
            return;
        }

        if self.unrecognized.len() >= MAX_UNRECOGNIZED {
            let stalest = self
                .unrecognized
                .iter()
                .min_by_key(|(_, entry)| entry.seen_at)
                .map(|(id, _)| id.clone());
            if let Some(id) = stalest {
                self.unrecognized.remove(&id);
            }
        }
        self.unrecognized.insert(device_id.to_string(), entry);
    }

    /// Status for each known checkpoint identity
    pub fn status(&self, timeout: Duration) -> BTreeMap<CheckpointId, SensorStatus> {
        let now = self.clock.monotonic();

        CheckpointId::ALL
            .iter()
            .map(|&checkpoint| {
                let is_local = self.local_checkpoint == Some(checkpoint);
                let view = match self.known.get(&checkpoint) {
                    Some(entry) => {
                        let age = now.saturating_sub(entry.seen_at);
                        let status = if age <= timeout {
                            LivenessStatus::Online
                        } else if is_local {
                            LivenessStatus::Local
                        } else {
                            LivenessStatus::Offline
                        };
                        SensorStatus {
                            status,
                            last_seen: Some(entry.last_seen),
                            age_ms: Some(u64::try_from(age.as_millis()).unwrap_or(u64::MAX)),
                            address: entry.address.map(|a| a.to_string()),
                            last_kind: Some(entry.kind),
                        }
                    }
                    None => SensorStatus {
                        status: if is_local {
                            LivenessStatus::Local
                        } else {
                            LivenessStatus::Unknown
                        },
                        last_seen: None,
                        age_ms: None,
                        address: None,
                        last_kind: None,
                    },
                };
                (checkpoint, view)
            })
            .collect()
    }

    /// Status only, without ages; used to detect transitions
    pub fn status_map(&self, timeout: Duration) -> BTreeMap<CheckpointId, LivenessStatus> {
        self.status(timeout)
            .into_iter()
            .map(|(checkpoint, view)| (checkpoint, view.status))
            .collect()
    }

    /// Raw entry for any device identity
    pub fn entry(&self, device_id: &str) -> Option<&LivenessEntry> {
        match CheckpointId::parse(device_id) {
            Some(checkpoint) => self.known.get(&checkpoint),
            None => self.unrecognized.get(device_id),
        }
    }

    /// All entries, including retained unrecognized identities
    pub fn entries(&self) -> impl Iterator<Item = (&str, &LivenessEntry)> {
        self.known
            .iter()
            .map(|(checkpoint, entry)| (checkpoint.as_str(), entry))
            .chain(self.unrecognized.iter().map(|(id, entry)| (id.as_str(), entry)))
    }

    pub fn local_checkpoint(&self) -> Option<CheckpointId> {
        self.local_checkpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn tracker(local: Option<CheckpointId>) -> (Arc<ManualClock>, LivenessTracker) {
        let clock = Arc::new(ManualClock::at_epoch());
        let tracker = LivenessTracker::new(clock.clone(), local);
        (clock, tracker)
    }

    fn remote() -> Source {
        Source::Remote("192.168.50.11:40000".parse().unwrap())
    }

    #[test]
    fn test_unknown_until_seen() {
        let (_clock, tracker) = tracker(None);
        let status = tracker.status(TIMEOUT);
        assert_eq!(status.len(), 3);
        assert!(status.values().all(|s| s.status == LivenessStatus::Unknown));
    }

    #[test]
    fn test_online_offline_online() {
        let (clock, mut tracker) = tracker(None);

        tracker.mark_seen("tee", remote(), MessageKind::Heartbeat);
        assert_eq!(tracker.status(TIMEOUT)[&CheckpointId::Tee].status, LivenessStatus::Online);

        // Exactly at the timeout is still online
        clock.advance(TIMEOUT);
        assert_eq!(tracker.status(TIMEOUT)[&CheckpointId::Tee].status, LivenessStatus::Online);

        clock.advance(Duration::from_millis(1));
        let view = &tracker.status(TIMEOUT)[&CheckpointId::Tee];
        assert_eq!(view.status, LivenessStatus::Offline);
        assert_eq!(view.age_ms, Some(10_001));

        // Any message kind brings it back
        tracker.mark_seen("tee", remote(), MessageKind::Trigger);
        let view = &tracker.status(TIMEOUT)[&CheckpointId::Tee];
        assert_eq!(view.status, LivenessStatus::Online);
        assert_eq!(view.last_kind, Some(MessageKind::Trigger));
        assert_eq!(view.address.as_deref(), Some("192.168.50.11:40000"));
    }

    #[test]
    fn test_local_checkpoint_is_neutral() {
        let (clock, mut tracker) = tracker(Some(CheckpointId::HogClose));
        assert_eq!(
            tracker.status(TIMEOUT)[&CheckpointId::HogClose].status,
            LivenessStatus::Local
        );

        tracker.mark_seen("hog_close", Source::Local, MessageKind::Trigger);
        let view = &tracker.status(TIMEOUT)[&CheckpointId::HogClose];
        assert_eq!(view.status, LivenessStatus::Online);
        assert_eq!(view.address, None);

        // Silence on the local sensor never reads as offline
        clock.advance(TIMEOUT * 3);
        assert_eq!(
            tracker.status(TIMEOUT)[&CheckpointId::HogClose].status,
            LivenessStatus::Local
        );
    }

    #[test]
    fn test_unrecognized_identity_tracked_but_not_reported() {
        let (_clock, mut tracker) = tracker(None);
        tracker.mark_seen("back_line", remote(), MessageKind::Heartbeat);

        assert!(tracker.entry("back_line").is_some());
        assert_eq!(tracker.entries().count(), 1);
        assert!(tracker
            .status(TIMEOUT)
            .values()
            .all(|s| s.status == LivenessStatus::Unknown));
    }

    #[test]
    fn test_unrecognized_flood_stays_bounded() {
        let (clock, mut tracker) = tracker(None);
        tracker.mark_seen("tee", remote(), MessageKind::Heartbeat);

        for i in 0..10_000 {
            clock.advance(Duration::from_micros(1));
            tracker.mark_seen(&format!("junk_{}", i), remote(), MessageKind::Heartbeat);
        }

        assert_eq!(tracker.entries().count(), MAX_UNRECOGNIZED + 1);
        // Known checkpoints are never evicted
        assert!(tracker.entry("tee").is_some());
        // Most recent identities survive, oldest are gone
        assert!(tracker.entry("junk_9999").is_some());
        assert!(tracker.entry("junk_0").is_none());
    }

    #[test]
    fn test_refreshing_unrecognized_does_not_evict() {
        let (clock, mut tracker) = tracker(None);
        for i in 0..MAX_UNRECOGNIZED {
            tracker.mark_seen(&format!("spare_{}", i), remote(), MessageKind::Heartbeat);
        }
        clock.advance(Duration::from_secs(1));
        tracker.mark_seen("spare_0", remote(), MessageKind::Trigger);

        assert_eq!(tracker.entries().count(), MAX_UNRECOGNIZED);
        assert_eq!(tracker.entry("spare_0").map(|e| e.kind), Some(MessageKind::Trigger));
    }

    #[test]
    fn test_status_serializes_with_wire_names() {
        let (_clock, mut tracker) = tracker(None);
        tracker.mark_seen("hog_far", remote(), MessageKind::Heartbeat);
        let json = serde_json::to_value(tracker.status(TIMEOUT)).unwrap();
        assert_eq!(json["hog_far"]["status"], "online");
        assert_eq!(json["hog_far"]["last_kind"], "heartbeat");
        assert_eq!(json["tee"]["status"], "unknown");
    }
}
