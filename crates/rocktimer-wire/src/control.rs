//! Observer control commands and published envelopes

use serde::{Deserialize, Serialize};

/// Command sent by a live observer over its push channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Arm,
    Disarm,
}

impl ControlMessage {
    /// Parse an observer text frame; anything unrecognized is `None`
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Envelope for state pushed to observers
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ObserverEnvelope<T> {
    StateUpdate(T),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control() {
        assert_eq!(ControlMessage::parse(r#"{"type":"arm"}"#), Some(ControlMessage::Arm));
        assert_eq!(
            ControlMessage::parse(r#"{"type":"disarm","extra":true}"#),
            Some(ControlMessage::Disarm)
        );
        assert_eq!(ControlMessage::parse(r#"{"type":"reboot"}"#), None);
        assert_eq!(ControlMessage::parse("arm"), None);
    }

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_string(&ObserverEnvelope::StateUpdate(7)).unwrap();
        assert_eq!(json, r#"{"type":"state_update","data":7}"#);
    }
}
