//! Process-wide system state

use std::fmt;

use serde::{Deserialize, Serialize};

/// Measurement state machine position.
/// Mutated only by the measurement coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemState {
    /// Not accepting triggers
    #[default]
    Idle,
    /// Waiting for the first trigger of a run
    Armed,
    /// At least one trigger admitted, near hog line not yet passed
    Measuring,
    /// Mandatory portion finished and recorded
    Completed,
}

impl SystemState {
    pub fn as_str(self) -> &'static str {
        match self {
            SystemState::Idle => "idle",
            SystemState::Armed => "armed",
            SystemState::Measuring => "measuring",
            SystemState::Completed => "completed",
        }
    }

    /// Arm is only legal from a resting state
    #[inline]
    pub fn can_arm(self) -> bool {
        matches!(self, SystemState::Idle | SystemState::Completed)
    }

    #[inline]
    pub fn can_disarm(self) -> bool {
        !matches!(self, SystemState::Idle)
    }

    /// Live (non-backfill) triggers are only admitted in these states
    #[inline]
    pub fn accepts_triggers(self) -> bool {
        matches!(self, SystemState::Armed | SystemState::Measuring)
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a control command
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub state: SystemState,
}

impl CommandResult {
    pub fn new(success: bool, state: SystemState) -> Self {
        CommandResult { success, state }
    }
}
