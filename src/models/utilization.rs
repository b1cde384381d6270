// Result of a windowed utilization query

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DiskRate, SystemResources};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utilization {
    #[serde(rename = "windowRequestedMs", with = "duration_ms")]
    pub window_requested: Duration,
    /// Timestamps of the two snapshots the deltas were taken between.
    pub span_start: DateTime<Utc>,
    pub span_end: DateTime<Utc>,
    pub cpu_used_fraction: f64,
    pub memory_used_fraction: f64,
    pub memory_used_bytes: u64,
    pub per_disk_busy_fraction: BTreeMap<String, f64>,
    /// Average per-second rate over the span.
    pub per_disk_rates: BTreeMap<DiskRate, BTreeMap<String, f64>>,
    pub system_resources: SystemResources,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
