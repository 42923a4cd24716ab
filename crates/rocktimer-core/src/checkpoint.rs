//! Checkpoint identities
//!
//! The track has a closed set of three detection points. Traversal order
//! is tee → near hog line → far hog line; every timing invariant in the
//! coordinator is expressed in terms of this order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{RockTimerError, RockTimerResult};

/// One of the fixed physical detection points along the track
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointId {
    /// Start line
    Tee,
    /// Near intermediate line
    HogClose,
    /// Far intermediate line
    HogFar,
}

impl CheckpointId {
    /// All checkpoints in traversal order
    pub const ALL: [CheckpointId; 3] = [
        CheckpointId::Tee,
        CheckpointId::HogClose,
        CheckpointId::HogFar,
    ];

    /// Parse a wire device identity. Unknown identities yield `None`.
    pub fn parse(device_id: &str) -> Option<Self> {
        match device_id {
            "tee" => Some(CheckpointId::Tee),
            "hog_close" => Some(CheckpointId::HogClose),
            "hog_far" => Some(CheckpointId::HogFar),
            _ => None,
        }
    }

    /// Wire identity string
    pub fn as_str(self) -> &'static str {
        match self {
            CheckpointId::Tee => "tee",
            CheckpointId::HogClose => "hog_close",
            CheckpointId::HogFar => "hog_far",
        }
    }

    /// Position in traversal order (0-based)
    #[inline]
    pub fn traversal_index(self) -> usize {
        match self {
            CheckpointId::Tee => 0,
            CheckpointId::HogClose => 1,
            CheckpointId::HogFar => 2,
        }
    }

    /// The checkpoint that must be passed immediately before this one
    pub fn predecessor(self) -> Option<CheckpointId> {
        match self {
            CheckpointId::Tee => None,
            CheckpointId::HogClose => Some(CheckpointId::Tee),
            CheckpointId::HogFar => Some(CheckpointId::HogClose),
        }
    }
}

impl fmt::Debug for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checkpoint({})", self.as_str())
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckpointId {
    type Err = RockTimerError;

    fn from_str(s: &str) -> RockTimerResult<Self> {
        CheckpointId::parse(s).ok_or_else(|| RockTimerError::UnknownCheckpoint(s.to_string()))
    }
}
