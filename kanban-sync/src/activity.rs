//! Record of persistence calls issued to the remote store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Entries kept by [`ActivityLog::default`]
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 256;

/// One persistence call and how it ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Unique ID for this entry (ULID format)
    pub id: String,

    /// When the call completed
    pub timestamp: DateTime<Utc>,

    /// Canonical op string (e.g., "move card", "move column")
    pub op: String,

    /// The call's arguments
    pub input: Value,

    /// `{"ok": true}` or `{"error": "..."}`
    pub output: Value,

    /// Snapshot generation the call was issued under
    pub generation: u64,

    /// How long the call took (milliseconds)
    pub duration_ms: u64,
}

impl ActivityEntry {
    pub fn new(
        op: impl Into<String>,
        input: Value,
        output: Value,
        generation: u64,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            timestamp: Utc::now(),
            op: op.into(),
            input,
            output,
            generation,
            duration_ms,
        }
    }

    /// Whether the call succeeded
    pub fn succeeded(&self) -> bool {
        self.output.get("error").is_none()
    }
}

/// Bounded in-memory log; the oldest entries fall off the end
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
}

impl ActivityLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_ACTIVITY_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, entry: ActivityEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
    }

    /// Up to `limit` entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<ActivityEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ACTIVITY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(n: u64) -> ActivityEntry {
        ActivityEntry::new("move card", json!({ "card": n }), json!({ "ok": true }), 1, 0)
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut log = ActivityLog::default();
        log.record(entry(1));
        log.record(entry(2));

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].input["card"], 2);
        assert_eq!(recent[1].input["card"], 1);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut log = ActivityLog::with_capacity(2);
        for n in 1..=3 {
            log.record(entry(n));
        }
        assert_eq!(log.len(), 2);
        let cards: Vec<_> = log.recent(5).iter().map(|e| e.input["card"].clone()).collect();
        assert_eq!(cards, vec![json!(3), json!(2)]);
    }

    #[test]
    fn test_succeeded() {
        assert!(entry(1).succeeded());
        let failed = ActivityEntry::new("move column", json!({}), json!({ "error": "timeout" }), 2, 30);
        assert!(!failed.succeeded());
        assert_eq!(failed.id.len(), 26);
    }
}
