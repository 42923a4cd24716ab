//! Sensor datagram messages
//!
//! `{"type":"trigger","device_id":"tee","timestamp_ns":1700000000000000000}`
//! `{"type":"heartbeat","device_id":"hog_far"}`

use serde::{Deserialize, Serialize};

use rocktimer_core::{CheckpointEvent, MessageKind, RockTimerError, RockTimerResult, Source, TimestampNs};

/// Maximum datagram size accepted from a sensor
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Inbound sensor message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    /// Beam break at a sender-local instant
    Trigger { device_id: String, timestamp_ns: u64 },
    /// Liveness ping; the timestamp is the receipt time
    Heartbeat { device_id: String },
}

impl WireMessage {
    pub fn trigger(device_id: impl Into<String>, timestamp: TimestampNs) -> Self {
        WireMessage::Trigger {
            device_id: device_id.into(),
            timestamp_ns: timestamp.as_nanos(),
        }
    }

    pub fn heartbeat(device_id: impl Into<String>) -> Self {
        WireMessage::Heartbeat {
            device_id: device_id.into(),
        }
    }

    /// Parse a datagram payload.
    /// Rejects oversized input, bad JSON, unknown types and empty required fields.
    pub fn parse(buf: &[u8]) -> RockTimerResult<Self> {
        if buf.len() > MAX_MESSAGE_SIZE {
            return Err(RockTimerError::MessageTooLarge {
                size: buf.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let message: WireMessage = serde_json::from_slice(buf)
            .map_err(|e| RockTimerError::InvalidMessage(e.to_string()))?;

        if message.device_id().is_empty() {
            return Err(RockTimerError::InvalidMessage("empty device_id".into()));
        }
        if let WireMessage::Trigger { timestamp_ns: 0, .. } = message {
            return Err(RockTimerError::InvalidMessage("missing timestamp_ns".into()));
        }

        Ok(message)
    }

    /// Serialize to a datagram payload
    pub fn encode(&self) -> RockTimerResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RockTimerError::InvalidMessage(e.to_string()))
    }

    pub fn device_id(&self) -> &str {
        match self {
            WireMessage::Trigger { device_id, .. } | WireMessage::Heartbeat { device_id } => {
                device_id
            }
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            WireMessage::Trigger { .. } => MessageKind::Trigger,
            WireMessage::Heartbeat { .. } => MessageKind::Heartbeat,
        }
    }

    /// Convert a trigger into a checkpoint event. Heartbeats carry no event.
    pub fn into_event(self, source: Source) -> Option<CheckpointEvent> {
        match self {
            WireMessage::Trigger {
                device_id,
                timestamp_ns,
            } => Some(CheckpointEvent::new(
                device_id,
                TimestampNs::from_nanos(timestamp_ns),
                source,
            )),
            WireMessage::Heartbeat { .. } => None,
        }
    }
}
