use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Default)]
struct UsageRecord {
    accumulated_secs: f64,
    /// Start of the segment not yet accounted for; `None` when inactive
    segment_start: Option<Instant>,
}

/// Point-in-time view of one session's usage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub accumulated_seconds: f64,
    pub active: bool,
}

/// Process-wide elapsed-time accounting per session id.
///
/// Totals are kept after a session ends, so a reconnect with the same id
/// continues from its previous total.
#[derive(Default)]
pub struct UsageLedger {
    records: Mutex<HashMap<String, UsageRecord>>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an accounting segment for the session
    pub fn start_session(&self, session_id: &str) {
        let mut records = self.records.lock();
        let record = records.entry(session_id.to_string()).or_default();
        record.segment_start = Some(Instant::now());
        debug!(session_id, total = record.accumulated_secs, "Usage segment started");
    }

    /// Add the time since the last update to the session's total
    pub fn update(&self, session_id: &str) -> f64 {
        let mut records = self.records.lock();
        match records.get_mut(session_id) {
            Some(record) => Self::accumulate(record, Instant::now()),
            None => 0.0,
        }
    }

    /// Pure comparison against the running total
    pub fn is_limit_exceeded(&self, session_id: &str, limit_secs: f64) -> bool {
        self.accumulated(session_id) >= limit_secs
    }

    /// Final update, then mark the session inactive
    pub fn end_session(&self, session_id: &str) {
        let mut records = self.records.lock();
        if let Some(record) = records.get_mut(session_id) {
            let total = Self::accumulate(record, Instant::now());
            record.segment_start = None;
            debug!(session_id, total, "Usage segment ended");
        }
    }

    pub fn accumulated(&self, session_id: &str) -> f64 {
        self.records
            .lock()
            .get(session_id)
            .map_or(0.0, |r| r.accumulated_secs)
    }

    pub fn snapshot(&self, session_id: &str) -> Option<UsageSnapshot> {
        self.records.lock().get(session_id).map(|r| UsageSnapshot {
            accumulated_seconds: r.accumulated_secs,
            active: r.segment_start.is_some(),
        })
    }

    fn accumulate(record: &mut UsageRecord, now: Instant) -> f64 {
        if let Some(start) = record.segment_start {
            record.accumulated_secs += now.duration_since(start).as_secs_f64();
            record.segment_start = Some(now);
        }
        record.accumulated_secs
    }
}
