//! Measurement coordinator
//!
//! Owns the system state, the single in-flight session and the history.
//! Every trigger passes through `handle_trigger`; nothing here blocks or
//! fails. Rejections are reported as outcomes and logged at debug level.
//!
//! Admission pipeline:
//! 1. Far-line backfill after completion
//! 2. State gate (Armed/Measuring only)
//! 3. First-wins duplicate check
//! 4. Traversal-order check against the predecessor checkpoint
//! 5. Record, start measuring, complete on the near hog line

use std::sync::Arc;

use tracing::{debug, info};

use rocktimer_core::{
    CheckpointEvent, CheckpointId, CommandResult, RecordId, SystemState, TimestampNs,
};
use rocktimer_time::Clock;

use crate::{Backfill, HistoryStore, MeasurementSession};

/// One-way notification for downstream collaborators (speech, display)
#[derive(Clone, Debug, PartialEq)]
pub enum Announcement {
    /// System armed for a new run
    Armed,
    /// Tee to near hog line is known
    FirstSplit { record_id: RecordId, split_ms: f64 },
    /// Near to far hog line is known
    SecondSplit {
        record_id: Option<RecordId>,
        split_ms: f64,
        total_ms: Option<f64>,
    },
}

/// Why a trigger was not admitted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Device identity outside the known checkpoint set
    Unrecognized,
    /// State does not accept live triggers
    NotAccepting(SystemState),
    /// Checkpoint already recorded in this session
    Duplicate(CheckpointId),
    /// Predecessor missing or not strictly earlier
    OutOfOrder {
        checkpoint: CheckpointId,
        requires: CheckpointId,
    },
}

/// Result of offering a trigger to the coordinator
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TriggerOutcome {
    /// Recorded in the live session; `completed` is set when this finished the run
    Admitted {
        checkpoint: CheckpointId,
        completed: Option<RecordId>,
    },
    /// Far line recorded after completion; `record_id` is the record that was updated
    Backfilled { record_id: Option<RecordId> },
    /// Not recorded
    Dropped(DropReason),
}

impl TriggerOutcome {
    /// Whether observable state changed
    pub fn is_accepted(&self) -> bool {
        !matches!(self, TriggerOutcome::Dropped(_))
    }
}

/// Coordinator counters
#[derive(Clone, Debug, Default)]
pub struct CoordinatorStats {
    pub triggers_seen: u64,
    pub admitted: u64,
    pub backfilled: u64,
    pub dropped: u64,
    pub records_created: u64,
}

/// Measurement coordinator - the state machine
pub struct MeasurementCoordinator {
    state: SystemState,
    session: MeasurementSession,
    history: HistoryStore,
    /// Record produced by the current session, target of backfill
    session_record: Option<RecordId>,
    /// Notifications not yet handed to the runtime
    announcements: Vec<Announcement>,
    clock: Arc<dyn Clock>,
    stats: CoordinatorStats,
}

impl MeasurementCoordinator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MeasurementCoordinator {
            state: SystemState::Idle,
            session: MeasurementSession::new(),
            history: HistoryStore::new(),
            session_record: None,
            announcements: Vec::new(),
            clock,
            stats: CoordinatorStats::default(),
        }
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    pub fn session(&self) -> &MeasurementSession {
        &self.session
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    /// Take pending announcements
    pub fn drain_announcements(&mut self) -> Vec<Announcement> {
        std::mem::take(&mut self.announcements)
    }

    /// Arm for a new run. Legal from Idle or Completed only.
    pub fn arm(&mut self) -> CommandResult {
        if !self.state.can_arm() {
            debug!(state = %self.state, "arm ignored");
            return CommandResult::new(false, self.state);
        }

        self.session = MeasurementSession::new();
        self.session_record = None;
        self.state = SystemState::Armed;
        self.announcements.push(Announcement::Armed);
        info!("armed");
        CommandResult::new(true, self.state)
    }

    /// Return to Idle and discard the session
    pub fn disarm(&mut self) -> CommandResult {
        if !self.state.can_disarm() {
            debug!(state = %self.state, "disarm ignored");
            return CommandResult::new(false, self.state);
        }

        self.session = MeasurementSession::new();
        self.session_record = None;
        self.state = SystemState::Idle;
        info!("disarmed");
        CommandResult::new(true, self.state)
    }

    /// Offer a trigger
    pub fn handle_trigger(&mut self, event: &CheckpointEvent) -> TriggerOutcome {
        self.stats.triggers_seen += 1;

        let outcome = self.admit(event);
        match outcome {
            TriggerOutcome::Admitted { .. } => self.stats.admitted += 1,
            TriggerOutcome::Backfilled { .. } => self.stats.backfilled += 1,
            TriggerOutcome::Dropped(reason) => {
                self.stats.dropped += 1;
                debug!(
                    device = %event.device_id,
                    timestamp = ?event.timestamp,
                    ?reason,
                    "trigger dropped"
                );
            }
        }
        outcome
    }

    fn admit(&mut self, event: &CheckpointEvent) -> TriggerOutcome {
        let Some(checkpoint) = event.checkpoint() else {
            return TriggerOutcome::Dropped(DropReason::Unrecognized);
        };
        let timestamp = event.timestamp;

        // Stage 1: far line after completion backfills the completed session
        if checkpoint == CheckpointId::HogFar
            && self.state == SystemState::Completed
            && self.session.timestamp(CheckpointId::HogFar).is_none()
        {
            return self.backfill(timestamp);
        }

        // Stage 2: state gate
        if !self.state.accepts_triggers() {
            return TriggerOutcome::Dropped(DropReason::NotAccepting(self.state));
        }

        // Stage 3: first admitted value wins
        if self.session.timestamp(checkpoint).is_some() {
            return TriggerOutcome::Dropped(DropReason::Duplicate(checkpoint));
        }

        // Stage 4: traversal order
        if let Some(requires) = checkpoint.predecessor() {
            if !self.follows(requires, timestamp) {
                return TriggerOutcome::Dropped(DropReason::OutOfOrder {
                    checkpoint,
                    requires,
                });
            }
        }

        // Stage 5: record
        if self.state == SystemState::Armed {
            self.state = SystemState::Measuring;
            self.session.mark_started(self.clock.now_wall());
            info!(%checkpoint, "measuring");
        }
        self.session.record(checkpoint, timestamp);

        let completed = match checkpoint {
            CheckpointId::HogClose => Some(self.complete()),
            CheckpointId::HogFar => {
                // Live far line: the run was already finalized by the near line
                self.apply_far_split();
                None
            }
            CheckpointId::Tee => None,
        };

        TriggerOutcome::Admitted {
            checkpoint,
            completed,
        }
    }

    /// True if `requires` is recorded strictly before `timestamp`
    fn follows(&self, requires: CheckpointId, timestamp: TimestampNs) -> bool {
        self.session
            .timestamp(requires)
            .is_some_and(|earlier| timestamp > earlier)
    }

    /// Near hog line passed: finalize the mandatory portion
    fn complete(&mut self) -> RecordId {
        let split_ms = self.session.tee_to_hog_close_ms().unwrap_or_default();
        let record_id = self.history.append(self.clock.now_wall(), split_ms);

        self.state = SystemState::Completed;
        self.session_record = Some(record_id);
        self.stats.records_created += 1;
        self.announcements
            .push(Announcement::FirstSplit { record_id, split_ms });

        info!(record = %record_id, tee_to_hog_close_ms = split_ms, "completed");
        record_id
    }

    fn backfill(&mut self, timestamp: TimestampNs) -> TriggerOutcome {
        if !self.follows(CheckpointId::HogClose, timestamp) {
            return TriggerOutcome::Dropped(DropReason::OutOfOrder {
                checkpoint: CheckpointId::HogFar,
                requires: CheckpointId::HogClose,
            });
        }

        self.session.record(CheckpointId::HogFar, timestamp);
        let record_id = self.apply_far_split();
        TriggerOutcome::Backfilled { record_id }
    }

    /// Push the far split into this session's record and announce it
    fn apply_far_split(&mut self) -> Option<RecordId> {
        let split_ms = self.session.hog_to_hog_ms()?;
        let total_ms = self.session.total_ms();

        let updated = self.session_record.filter(|&id| {
            self.history.update_last(
                id,
                Backfill {
                    hog_to_hog_ms: split_ms,
                    total_ms,
                },
            )
        });

        match updated {
            Some(id) => info!(record = %id, hog_to_hog_ms = split_ms, ?total_ms, "backfilled"),
            None => debug!(hog_to_hog_ms = split_ms, "far split recorded, no record to update"),
        }

        self.announcements.push(Announcement::SecondSplit {
            record_id: updated,
            split_ms,
            total_ms,
        });
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rocktimer_core::Source;
    use rocktimer_time::ManualClock;

    const T0: u64 = 1_700_000_000_000_000_000;
    const SEC: u64 = 1_000_000_000;

    fn coordinator() -> MeasurementCoordinator {
        MeasurementCoordinator::new(Arc::new(ManualClock::at_epoch()))
    }

    fn trigger(checkpoint: CheckpointId, nanos: u64) -> CheckpointEvent {
        CheckpointEvent::at(checkpoint, TimestampNs(nanos), Source::Local)
    }

    #[test]
    fn test_arm_guards() {
        let mut c = coordinator();
        assert_eq!(c.arm(), CommandResult::new(true, SystemState::Armed));
        assert_eq!(c.arm(), CommandResult::new(false, SystemState::Armed));

        c.handle_trigger(&trigger(CheckpointId::Tee, T0));
        assert_eq!(c.state(), SystemState::Measuring);
        assert_eq!(c.arm(), CommandResult::new(false, SystemState::Measuring));
        assert_eq!(c.session().timestamp(CheckpointId::Tee), Some(TimestampNs(T0)));
    }

    #[test]
    fn test_disarm_guards() {
        let mut c = coordinator();
        assert_eq!(c.disarm(), CommandResult::new(false, SystemState::Idle));

        c.arm();
        c.handle_trigger(&trigger(CheckpointId::Tee, T0));
        assert_eq!(c.disarm(), CommandResult::new(true, SystemState::Idle));
        assert!(c.session().is_empty());
    }

    #[test]
    fn test_full_run_completes_with_exact_split() {
        let mut c = coordinator();
        let before = c.history().next_id();
        c.arm();

        let first = c.handle_trigger(&trigger(CheckpointId::Tee, T0));
        assert_eq!(
            first,
            TriggerOutcome::Admitted {
                checkpoint: CheckpointId::Tee,
                completed: None
            }
        );

        let second = c.handle_trigger(&trigger(CheckpointId::HogClose, T0 + 3 * SEC));
        assert_eq!(
            second,
            TriggerOutcome::Admitted {
                checkpoint: CheckpointId::HogClose,
                completed: Some(before)
            }
        );

        assert_eq!(c.state(), SystemState::Completed);
        assert_eq!(c.session().tee_to_hog_close_ms(), Some(3000.0));

        let front = c.history().front().unwrap();
        assert_eq!(front.id, before);
        assert_eq!(front.tee_to_hog_close_ms, 3000.0);
        assert_eq!(front.hog_to_hog_ms, None);

        assert_eq!(
            c.drain_announcements(),
            vec![
                Announcement::Armed,
                Announcement::FirstSplit {
                    record_id: before,
                    split_ms: 3000.0
                }
            ]
        );
        assert!(c.drain_announcements().is_empty());
    }

    #[test]
    fn test_near_line_not_after_tee_rejected() {
        let mut c = coordinator();
        c.arm();
        c.handle_trigger(&trigger(CheckpointId::Tee, T0));

        for ts in [T0, T0 - 1] {
            let outcome = c.handle_trigger(&trigger(CheckpointId::HogClose, ts));
            assert_eq!(
                outcome,
                TriggerOutcome::Dropped(DropReason::OutOfOrder {
                    checkpoint: CheckpointId::HogClose,
                    requires: CheckpointId::Tee
                })
            );
            assert_eq!(c.state(), SystemState::Measuring);
            assert_eq!(c.session().timestamp(CheckpointId::HogClose), None);
        }
        assert!(c.history().is_empty());
    }

    #[test]
    fn test_near_line_before_tee_keeps_armed() {
        let mut c = coordinator();
        c.arm();
        let outcome = c.handle_trigger(&trigger(CheckpointId::HogClose, T0));
        assert!(!outcome.is_accepted());
        assert_eq!(c.state(), SystemState::Armed);
        assert_eq!(c.session().started_at(), None);
    }

    #[test]
    fn test_duplicate_tee_first_wins() {
        let mut c = coordinator();
        c.arm();
        c.handle_trigger(&trigger(CheckpointId::Tee, T0));
        let dup = c.handle_trigger(&trigger(CheckpointId::Tee, T0 + SEC));
        assert_eq!(
            dup,
            TriggerOutcome::Dropped(DropReason::Duplicate(CheckpointId::Tee))
        );
        assert_eq!(c.session().timestamp(CheckpointId::Tee), Some(TimestampNs(T0)));
    }

    #[test]
    fn test_triggers_ignored_when_idle() {
        let mut c = coordinator();
        let outcome = c.handle_trigger(&trigger(CheckpointId::Tee, T0));
        assert_eq!(
            outcome,
            TriggerOutcome::Dropped(DropReason::NotAccepting(SystemState::Idle))
        );
        assert!(c.session().is_empty());
    }

    #[test]
    fn test_unrecognized_device_ignored() {
        let mut c = coordinator();
        c.arm();
        let event = CheckpointEvent::new("back_line", TimestampNs(T0), Source::Local);
        assert_eq!(
            c.handle_trigger(&event),
            TriggerOutcome::Dropped(DropReason::Unrecognized)
        );
        assert_eq!(c.state(), SystemState::Armed);
    }

    #[test]
    fn test_far_line_backfills_after_completion() {
        let mut c = coordinator();
        c.arm();
        c.handle_trigger(&trigger(CheckpointId::Tee, T0));
        c.handle_trigger(&trigger(CheckpointId::HogClose, T0 + 3 * SEC));
        let record = c.history().front().unwrap().id;
        c.drain_announcements();

        let outcome = c.handle_trigger(&trigger(CheckpointId::HogFar, T0 + 13 * SEC));
        assert_eq!(
            outcome,
            TriggerOutcome::Backfilled {
                record_id: Some(record)
            }
        );
        assert_eq!(c.state(), SystemState::Completed);

        let front = c.history().front().unwrap();
        assert_eq!(front.hog_to_hog_ms, Some(10_000.0));
        assert_eq!(front.total_ms, Some(13_000.0));
        assert_eq!(
            c.drain_announcements(),
            vec![Announcement::SecondSplit {
                record_id: Some(record),
                split_ms: 10_000.0,
                total_ms: Some(13_000.0)
            }]
        );

        // Only once
        let again = c.handle_trigger(&trigger(CheckpointId::HogFar, T0 + 14 * SEC));
        assert!(!again.is_accepted());
        assert_eq!(c.history().front().unwrap().hog_to_hog_ms, Some(10_000.0));
    }

    #[test]
    fn test_far_line_not_after_near_line_rejected() {
        let mut c = coordinator();
        c.arm();
        c.handle_trigger(&trigger(CheckpointId::Tee, T0));
        c.handle_trigger(&trigger(CheckpointId::HogClose, T0 + 3 * SEC));

        let outcome = c.handle_trigger(&trigger(CheckpointId::HogFar, T0 + 3 * SEC));
        assert!(matches!(
            outcome,
            TriggerOutcome::Dropped(DropReason::OutOfOrder { .. })
        ));
        assert_eq!(c.state(), SystemState::Completed);
        assert_eq!(c.history().front().unwrap().hog_to_hog_ms, None);
        assert_eq!(c.session().timestamp(CheckpointId::HogFar), None);
    }

    #[test]
    fn test_far_line_while_measuring_rejected() {
        let mut c = coordinator();
        c.arm();
        c.handle_trigger(&trigger(CheckpointId::Tee, T0));
        let outcome = c.handle_trigger(&trigger(CheckpointId::HogFar, T0 + 13 * SEC));
        assert!(!outcome.is_accepted());
        assert_eq!(c.state(), SystemState::Measuring);
        assert!(c.history().is_empty());
    }

    #[test]
    fn test_backfill_skips_deleted_record() {
        let mut c = coordinator();
        c.arm();
        c.handle_trigger(&trigger(CheckpointId::Tee, T0));
        c.handle_trigger(&trigger(CheckpointId::HogClose, T0 + 3 * SEC));
        let record = c.history().front().unwrap().id;
        assert!(c.history_mut().delete(record));

        let outcome = c.handle_trigger(&trigger(CheckpointId::HogFar, T0 + 13 * SEC));
        assert_eq!(outcome, TriggerOutcome::Backfilled { record_id: None });
        assert_eq!(c.session().hog_to_hog_ms(), Some(10_000.0));
    }

    #[test]
    fn test_rearm_closes_backfill_window() {
        let mut c = coordinator();
        c.arm();
        c.handle_trigger(&trigger(CheckpointId::Tee, T0));
        c.handle_trigger(&trigger(CheckpointId::HogClose, T0 + 3 * SEC));
        c.arm();

        let outcome = c.handle_trigger(&trigger(CheckpointId::HogFar, T0 + 13 * SEC));
        assert!(!outcome.is_accepted());
        assert_eq!(c.history().front().unwrap().hog_to_hog_ms, None);
        assert_eq!(c.state(), SystemState::Armed);
    }

    #[test]
    fn test_stats() {
        let mut c = coordinator();
        c.arm();
        c.handle_trigger(&trigger(CheckpointId::Tee, T0));
        c.handle_trigger(&trigger(CheckpointId::Tee, T0));
        c.handle_trigger(&trigger(CheckpointId::HogClose, T0 + SEC));
        c.handle_trigger(&trigger(CheckpointId::HogFar, T0 + 2 * SEC));

        let stats = c.stats();
        assert_eq!(stats.triggers_seen, 4);
        assert_eq!(stats.admitted, 2);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.backfilled, 1);
        assert_eq!(stats.records_created, 1);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Arm,
        Disarm,
        Trigger(usize, u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            1 => Just(Op::Arm),
            1 => Just(Op::Disarm),
            8 => (0usize..4, 0u64..50).prop_map(|(cp, ts)| Op::Trigger(cp, ts)),
        ]
    }

    proptest! {
        #[test]
        fn prop_session_stays_ordered_and_first_wins(ops in proptest::collection::vec(op_strategy(), 0..200)) {
            let mut c = coordinator();
            let mut last_front: Option<RecordId> = None;

            for op in ops {
                let before = c.session().clone();
                let rearmed = match op {
                    Op::Arm => c.arm().success,
                    Op::Disarm => c.disarm().success,
                    Op::Trigger(cp, ts) => {
                        let device = CheckpointId::ALL
                            .get(cp)
                            .map(|id| id.as_str())
                            .unwrap_or("back_line");
                        c.handle_trigger(&CheckpointEvent::new(device, TimestampNs(ts), Source::Local));
                        false
                    }
                };

                // Present timestamps strictly increase in traversal order
                let recorded: Vec<_> = c.session().recorded().collect();
                for pair in recorded.windows(2) {
                    prop_assert!(pair[0].0 < pair[1].0);
                    prop_assert!(pair[0].1 < pair[1].1);
                }

                // Within one session, a recorded slot never changes
                if !rearmed {
                    for (checkpoint, ts) in before.recorded() {
                        prop_assert_eq!(c.session().timestamp(checkpoint), Some(ts));
                    }
                }

                // Never record a later checkpoint without its predecessor
                for (checkpoint, _) in c.session().recorded() {
                    if let Some(prev) = checkpoint.predecessor() {
                        prop_assert!(c.session().timestamp(prev).is_some());
                    }
                }

                // Completed iff the near line is recorded
                prop_assert_eq!(
                    c.state() == SystemState::Completed,
                    c.session().timestamp(CheckpointId::HogClose).is_some()
                );

                if let Some(front) = c.history().front() {
                    if let Some(prev) = last_front {
                        prop_assert!(front.id >= prev);
                    }
                    last_front = Some(front.id);
                    prop_assert!(front.tee_to_hog_close_ms > 0.0);
                }
                prop_assert!(c.history().len() <= crate::MAX_HISTORY);
            }
        }
    }
}
