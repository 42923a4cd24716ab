//! Timing history - bounded, most-recent-first, in-memory only

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use rocktimer_core::RecordId;

/// Maximum records kept
pub const MAX_HISTORY: usize = 100;

/// Snapshot of a finished measurement
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimingRecord {
    pub id: RecordId,
    /// Creation time of the record
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Tee to near hog line; always present
    pub tee_to_hog_close_ms: f64,
    /// Near to far hog line; `None` if the stone never reached the far line
    pub hog_to_hog_ms: Option<f64>,
    /// Tee to far hog line
    pub total_ms: Option<f64>,
}

/// Late far-line splits written into an existing record
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backfill {
    pub hog_to_hog_ms: f64,
    pub total_ms: Option<f64>,
}

/// History store
#[derive(Debug)]
pub struct HistoryStore {
    /// Front is most recent
    records: VecDeque<TimingRecord>,
    next_id: RecordId,
    capacity: usize,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        HistoryStore {
            records: VecDeque::with_capacity(capacity.min(MAX_HISTORY)),
            next_id: RecordId::INITIAL,
            capacity,
        }
    }

    /// Insert a new record at the front and trim to capacity.
    /// Returns the assigned identity.
    pub fn append(&mut self, created_at: DateTime<Utc>, tee_to_hog_close_ms: f64) -> RecordId {
        let id = self.next_id;
        self.next_id = id.next();

        self.records.push_front(TimingRecord {
            id,
            created_at,
            tee_to_hog_close_ms,
            hog_to_hog_ms: None,
            total_ms: None,
        });
        self.records.truncate(self.capacity);
        id
    }

    /// Backfill the front record in place.
    /// Only applies if the front record is `expected` and has no far split yet.
    pub fn update_last(&mut self, expected: RecordId, backfill: Backfill) -> bool {
        match self.records.front_mut() {
            Some(record) if record.id == expected && record.hog_to_hog_ms.is_none() => {
                record.hog_to_hog_ms = Some(backfill.hog_to_hog_ms);
                record.total_ms = backfill.total_ms;
                true
            }
            _ => false,
        }
    }

    /// Up to `limit` most recent records, most recent first
    pub fn list(&self, limit: usize) -> Vec<TimingRecord> {
        self.records.iter().take(limit).cloned().collect()
    }

    pub fn get(&self, id: RecordId) -> Option<&TimingRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn front(&self) -> Option<&TimingRecord> {
        self.records.front()
    }

    /// Remove by identity; returns whether it was found
    pub fn delete(&mut self, id: RecordId) -> bool {
        match self.records.iter().position(|r| r.id == id) {
            Some(pos) => {
                self.records.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Empty the store and reset the identity counter.
    /// Ids handed out after a clear repeat ids used before it.
    pub fn clear(&mut self) {
        self.records.clear();
        self.next_id = RecordId::INITIAL;
    }

    /// Identity the next append will receive
    pub fn next_id(&self) -> RecordId {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}
