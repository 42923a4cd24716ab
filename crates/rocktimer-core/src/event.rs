//! Checkpoint events
//!
//! A checkpoint event asserts that the stone passed a detection point at
//! a sender-local instant. Events are immutable once received.

use std::fmt;
use std::net::SocketAddr;

use serde::{Serialize, Serializer};

use crate::{CheckpointId, TimestampNs};

/// Kind of inbound message, recorded for liveness
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Beam break with timing payload
    Trigger,
    /// Liveness-only ping
    Heartbeat,
}

/// Where an inbound message came from
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Remote sender reached over the network
    Remote(SocketAddr),
    /// Sensor attached to the coordinating host
    Local,
}

impl Source {
    /// Network address, if remote
    pub fn addr(self) -> Option<SocketAddr> {
        match self {
            Source::Remote(addr) => Some(addr),
            Source::Local => None,
        }
    }

    pub fn is_local(self) -> bool {
        matches!(self, Source::Local)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Remote(addr) => write!(f, "Remote({})", addr),
            Source::Local => f.write_str("Local"),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Remote(addr) => write!(f, "{}", addr),
            Source::Local => f.write_str("local"),
        }
    }
}

impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A trigger received from any sender
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointEvent {
    /// Device identity as sent on the wire; may be outside the known set
    pub device_id: String,
    /// Sender-local capture time
    pub timestamp: TimestampNs,
    /// Origin, used for liveness only
    pub source: Source,
}

impl CheckpointEvent {
    pub fn new(device_id: impl Into<String>, timestamp: TimestampNs, source: Source) -> Self {
        CheckpointEvent {
            device_id: device_id.into(),
            timestamp,
            source,
        }
    }

    /// Event for a known checkpoint
    pub fn at(checkpoint: CheckpointId, timestamp: TimestampNs, source: Source) -> Self {
        CheckpointEvent::new(checkpoint.as_str(), timestamp, source)
    }

    /// Recognized checkpoint identity, if any
    pub fn checkpoint(&self) -> Option<CheckpointId> {
        CheckpointId::parse(&self.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_checkpoint_recognition() {
        let addr: SocketAddr = "192.168.50.10:5000".parse().unwrap();
        let known = CheckpointEvent::at(CheckpointId::Tee, TimestampNs(1), Source::Remote(addr));
        assert_eq!(known.checkpoint(), Some(CheckpointId::Tee));

        let unknown = CheckpointEvent::new("back_line", TimestampNs(1), Source::Remote(addr));
        assert_eq!(unknown.checkpoint(), None);
    }

    #[test]
    fn test_source_display() {
        let addr: SocketAddr = "10.0.0.2:41000".parse().unwrap();
        assert_eq!(Source::Remote(addr).to_string(), "10.0.0.2:41000");
        assert_eq!(Source::Local.to_string(), "local");
        assert_eq!(Source::Local.addr(), None);
        assert!(Source::Local.is_local());
    }
}
