//! Identity types for RockTimer

use std::fmt;

use serde::{Deserialize, Serialize};

/// Timing record identity - assigned from a process-wide increasing counter
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// First identity handed out, and the value the counter returns to on clear
    pub const INITIAL: RecordId = RecordId(1);

    #[inline]
    pub fn new(id: u64) -> Self {
        RecordId(id)
    }

    #[inline]
    pub fn next(self) -> Self {
        RecordId(self.0.wrapping_add(1))
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        RecordId::INITIAL
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observer subscription identity
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubscriberId(pub u64);

impl SubscriberId {
    #[inline]
    pub fn new(id: u64) -> Self {
        SubscriberId(id)
    }
}

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscriber({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_sequence() {
        let first = RecordId::default();
        assert_eq!(first, RecordId::INITIAL);
        assert_eq!(first.next(), RecordId::new(2));
        assert!(first < first.next());
    }

    #[test]
    fn test_record_id_serializes_as_number() {
        let json = serde_json::to_string(&RecordId::new(42)).unwrap();
        assert_eq!(json, "42");
    }
}
