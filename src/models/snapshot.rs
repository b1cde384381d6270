// One sampling tick: cumulative CPU/disk counters plus instantaneous memory.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::counters::CounterKind;

/// Per-second disk counters that are integrated into running totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskRate {
    Reads,
    Writes,
    ReadBytes,
    WriteBytes,
}

impl DiskRate {
    pub const ALL: [DiskRate; 4] = [
        DiskRate::Reads,
        DiskRate::Writes,
        DiskRate::ReadBytes,
        DiskRate::WriteBytes,
    ];

    pub fn counter_kind(self) -> CounterKind {
        match self {
            DiskRate::Reads => CounterKind::DiskReads,
            DiskRate::Writes => CounterKind::DiskWrites,
            DiskRate::ReadBytes => CounterKind::DiskReadBytes,
            DiskRate::WriteBytes => CounterKind::DiskWriteBytes,
        }
    }
}

/// Immutable record of every tracked counter at one tick.
///
/// `cpu_time_consumed` and the disk maps are cumulative since the sampler started;
/// `memory_used` is the instantaneous value at `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    /// Busy seconds of the whole host, one wall-clock second per second at most.
    pub cpu_time_consumed: f64,
    pub memory_used: u64,
    pub per_disk_busy_seconds: BTreeMap<String, f64>,
    /// Whole units (operations or bytes) per counter, per disk.
    pub per_disk_counter_totals: BTreeMap<DiskRate, BTreeMap<String, u64>>,
}
