// Bounded, time-ordered snapshot store. One writer (the sampler), many readers.
// Readers copy out `Arc`s under a short read lock, so they never observe a half-applied append.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::Snapshot;

pub struct SnapshotRing {
    capacity: usize,
    entries: RwLock<VecDeque<Arc<Snapshot>>>,
}

impl SnapshotRing {
    /// `capacity` is raised to at least 2 so a delta is always possible. Storage grows with
    /// appends; nothing is reserved up front.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            entries: RwLock::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends, evicting the oldest entry when full. A snapshot not strictly newer than the
    /// newest retained one is dropped and `false` returned.
    pub fn append(&self, snapshot: Arc<Snapshot>) -> bool {
        let Ok(mut entries) = self.entries.write() else {
            tracing::warn!(operation = "ring_append", "snapshot ring lock poisoned");
            return false;
        };
        if let Some(last) = entries.back()
            && snapshot.timestamp <= last.timestamp
        {
            tracing::warn!(
                operation = "ring_append",
                newest = %last.timestamp,
                rejected = %snapshot.timestamp,
                "snapshot not newer than newest retained; dropped"
            );
            return false;
        }
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(snapshot);
        true
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.entries.read().ok().and_then(|e| e.back().cloned())
    }

    /// All snapshots with `timestamp >= now - window`, oldest first, preceded by the newest
    /// snapshot older than that boundary when one is retained.
    pub fn snapshots_within(&self, window: Duration, now: DateTime<Utc>) -> Vec<Arc<Snapshot>> {
        let Ok(entries) = self.entries.read() else {
            return Vec::new();
        };
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let boundary = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let first_in = entries.partition_point(|s| s.timestamp < boundary);
        let start = first_in.saturating_sub(1);
        entries
            .range(start..)
            .filter(|s| s.timestamp <= now)
            .cloned()
            .collect()
    }

    /// Copy of everything retained, oldest first.
    pub fn to_vec(&self) -> Vec<Arc<Snapshot>> {
        self.entries
            .read()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }
}
