//! Measurement session - the in-flight record of one run

use chrono::{DateTime, Utc};
use serde::Serialize;

use rocktimer_core::{split_ms, CheckpointId, TimestampNs};

/// Timestamps recorded for the current measurement attempt.
/// INVARIANT: present timestamps are strictly increasing in traversal order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeasurementSession {
    /// One slot per checkpoint, indexed by traversal order
    timestamps: [Option<TimestampNs>; 3],
    /// Wall-clock time of the first admitted trigger
    started_at: Option<DateTime<Utc>>,
}

/// Serializable view of a session with derived splits
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionView {
    pub tee_time_ns: Option<TimestampNs>,
    pub hog_close_time_ns: Option<TimestampNs>,
    pub hog_far_time_ns: Option<TimestampNs>,
    pub tee_to_hog_close_ms: Option<f64>,
    pub hog_to_hog_ms: Option<f64>,
    pub total_ms: Option<f64>,
    pub has_hog_close: bool,
    pub has_hog_far: bool,
    pub started_at: Option<DateTime<Utc>>,
}

impl MeasurementSession {
    pub fn new() -> Self {
        MeasurementSession::default()
    }

    /// Recorded timestamp for a checkpoint
    #[inline]
    pub fn timestamp(&self, checkpoint: CheckpointId) -> Option<TimestampNs> {
        self.timestamps[checkpoint.traversal_index()]
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.iter().all(Option::is_none)
    }

    /// Write a checkpoint slot. Validation is the coordinator's job.
    pub(crate) fn record(&mut self, checkpoint: CheckpointId, timestamp: TimestampNs) {
        self.timestamps[checkpoint.traversal_index()] = Some(timestamp);
    }

    pub(crate) fn mark_started(&mut self, at: DateTime<Utc>) {
        self.started_at = Some(at);
    }

    /// Split between any two checkpoints, defined only when both are recorded
    pub fn split(&self, from: CheckpointId, to: CheckpointId) -> Option<f64> {
        split_ms(self.timestamp(from), self.timestamp(to))
    }

    pub fn tee_to_hog_close_ms(&self) -> Option<f64> {
        self.split(CheckpointId::Tee, CheckpointId::HogClose)
    }

    pub fn hog_to_hog_ms(&self) -> Option<f64> {
        self.split(CheckpointId::HogClose, CheckpointId::HogFar)
    }

    pub fn total_ms(&self) -> Option<f64> {
        self.split(CheckpointId::Tee, CheckpointId::HogFar)
    }

    /// Stone passed the near hog line (mandatory portion done)
    pub fn has_hog_close(&self) -> bool {
        self.timestamp(CheckpointId::Tee).is_some()
            && self.timestamp(CheckpointId::HogClose).is_some()
    }

    /// Stone passed the far hog line
    pub fn has_hog_far(&self) -> bool {
        self.timestamp(CheckpointId::HogFar).is_some()
    }

    /// Present timestamps in traversal order
    pub fn recorded(&self) -> impl Iterator<Item = (CheckpointId, TimestampNs)> + '_ {
        CheckpointId::ALL
            .into_iter()
            .filter_map(|checkpoint| self.timestamp(checkpoint).map(|ts| (checkpoint, ts)))
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            tee_time_ns: self.timestamp(CheckpointId::Tee),
            hog_close_time_ns: self.timestamp(CheckpointId::HogClose),
            hog_far_time_ns: self.timestamp(CheckpointId::HogFar),
            tee_to_hog_close_ms: self.tee_to_hog_close_ms(),
            hog_to_hog_ms: self.hog_to_hog_ms(),
            total_ms: self.total_ms(),
            has_hog_close: self.has_hog_close(),
            has_hog_far: self.has_hog_far(),
            started_at: self.started_at,
        }
    }
}
