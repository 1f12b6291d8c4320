//! history.rs: bounded in-memory history of past aggregation snapshots,
//! read back for trend comparison.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::pipeline::AnalysisSnapshot;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub snapshot: AnalysisSnapshot,
    /// When the snapshot was current (its refresh time).
    pub timestamp: DateTime<Utc>,
}

/// Fixed-capacity ring buffer; the oldest entry is evicted first.
#[derive(Debug)]
pub struct History {
    inner: Mutex<VecDeque<HistoryEntry>>,
    cap: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl History {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 1_000);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<HistoryEntry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, snapshot: AnalysisSnapshot, timestamp: DateTime<Utc>) {
        let mut v = self.lock();
        if v.len() == self.cap {
            v.pop_front();
        }
        v.push_back(HistoryEntry {
            snapshot,
            timestamp,
        });
    }

    /// Most recent snapshot, if any.
    pub fn latest(&self) -> Option<AnalysisSnapshot> {
        self.lock().back().map(|e| e.snapshot.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }
}
