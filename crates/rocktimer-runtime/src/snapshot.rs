//! Published state snapshot

use std::collections::BTreeMap;

use serde::Serialize;

use rocktimer_core::{CheckpointId, SystemState};
use rocktimer_state::SessionView;
use rocktimer_time::SensorStatus;

/// Full observable state, copied under the node lock
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StateSnapshot {
    /// Monotonic publication counter; later snapshots never carry a lower value
    pub seq: u64,
    pub state: SystemState,
    pub session: SessionView,
    pub sensors: BTreeMap<CheckpointId, SensorStatus>,
}

impl StateSnapshot {
    /// Recorded flag per checkpoint
    pub fn recorded(&self, checkpoint: CheckpointId) -> bool {
        match checkpoint {
            CheckpointId::Tee => self.session.tee_time_ns.is_some(),
            CheckpointId::HogClose => self.session.hog_close_time_ns.is_some(),
            CheckpointId::HogFar => self.session.hog_far_time_ns.is_some(),
        }
    }
}
