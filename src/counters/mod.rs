// Counter capability consumed by the sampler. Platform adapters live in submodules;
// nothing outside this module knows which platform it is running on.

mod diskstats;
pub mod fake;
mod host;

pub use diskstats::{DiskStatsCounter, DiskStatsRow, parse_diskstats};
pub use host::HostCounterFactory;

use serde::{Deserialize, Serialize};

use crate::error::CounterError;
use crate::models::SystemResources;

/// Instance name used for host-wide counters.
pub const TOTAL_INSTANCE: &str = "_Total";

/// What a counter measures. Idle-time kinds report a percentage in `[0, 100]`;
/// the disk rate kinds report a per-second value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    CpuIdleTime,
    DiskIdleTime,
    DiskReads,
    DiskWrites,
    DiskReadBytes,
    DiskWriteBytes,
}

impl CounterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CounterKind::CpuIdleTime => "cpu_idle_time",
            CounterKind::DiskIdleTime => "disk_idle_time",
            CounterKind::DiskReads => "disk_reads",
            CounterKind::DiskWrites => "disk_writes",
            CounterKind::DiskReadBytes => "disk_read_bytes",
            CounterKind::DiskWriteBytes => "disk_write_bytes",
        }
    }
}

impl std::fmt::Display for CounterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OS metric stream for one instance.
///
/// `next_value` may advance internal state (rate counters diff against their previous
/// raw reading), so callers read exactly once per tick.
pub trait CounterSource: Send {
    fn instance_name(&self) -> &str;
    fn next_value(&mut self) -> Result<f64, CounterError>;
}

/// Instantaneous memory in use, in bytes.
pub trait MemoryGauge: Send {
    fn used_bytes(&mut self) -> Result<u64, CounterError>;
}

/// Creates counters for a platform. Registered by the host at startup.
pub trait CounterFactory: Send + Sync {
    fn create_counter(
        &self,
        kind: CounterKind,
        instance: &str,
    ) -> Result<Box<dyn CounterSource>, CounterError>;

    fn create_memory_gauge(&self) -> Result<Box<dyn MemoryGauge>, CounterError>;

    fn system_resources(&self) -> Result<SystemResources, CounterError>;
}
