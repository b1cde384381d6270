// Host capacity, read once at start

use serde::{Deserialize, Serialize};

/// Host capacity the utilization fractions are relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemResources {
    pub logical_cpus: u32,
    pub total_memory_bytes: u64,
}
