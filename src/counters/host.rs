// Host adapter: CPU and memory via sysinfo, disks via /proc/diskstats.

use std::path::PathBuf;

use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

use super::diskstats::{DiskStatsCounter, PROC_DISKSTATS};
use super::{CounterFactory, CounterKind, CounterSource, MemoryGauge, TOTAL_INSTANCE};
use crate::error::CounterError;
use crate::models::SystemResources;

pub struct HostCounterFactory {
    diskstats_path: PathBuf,
}

impl Default for HostCounterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCounterFactory {
    pub fn new() -> Self {
        Self {
            diskstats_path: PathBuf::from(PROC_DISKSTATS),
        }
    }

    /// Read disk counters from a different diskstats file (containers with a bind-mounted /proc).
    pub fn with_diskstats_path(path: impl Into<PathBuf>) -> Self {
        Self {
            diskstats_path: path.into(),
        }
    }
}

impl CounterFactory for HostCounterFactory {
    fn create_counter(
        &self,
        kind: CounterKind,
        instance: &str,
    ) -> Result<Box<dyn CounterSource>, CounterError> {
        match kind {
            CounterKind::CpuIdleTime => {
                if instance != TOTAL_INSTANCE {
                    return Err(CounterError::InstanceMissing {
                        instance: instance.to_string(),
                    });
                }
                Ok(Box::new(SysinfoCpuIdle::new()))
            }
            _ => Ok(Box::new(DiskStatsCounter::open(
                &self.diskstats_path,
                kind,
                instance,
            )?)),
        }
    }

    fn create_memory_gauge(&self) -> Result<Box<dyn MemoryGauge>, CounterError> {
        let gauge = SysinfoMemory::new();
        if gauge.total_bytes() == 0 {
            return Err(CounterError::Unavailable {
                counter: "memory_used".into(),
                instance: TOTAL_INSTANCE.into(),
                reason: "total memory reported as 0".into(),
            });
        }
        Ok(Box::new(gauge))
    }

    fn system_resources(&self) -> Result<SystemResources, CounterError> {
        let sys = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing())
                .with_memory(MemoryRefreshKind::everything()),
        );
        let logical_cpus = sys.cpus().len() as u32;
        if logical_cpus == 0 {
            return Err(CounterError::Unavailable {
                counter: "cpu_count".into(),
                instance: TOTAL_INSTANCE.into(),
                reason: "no CPUs reported".into(),
            });
        }
        Ok(SystemResources {
            logical_cpus,
            total_memory_bytes: sys.total_memory(),
        })
    }
}

/// Host-wide idle percentage. sysinfo computes usage between refreshes, so the first
/// read is only a baseline.
struct SysinfoCpuIdle {
    sys: System,
}

impl SysinfoCpuIdle {
    fn new() -> Self {
        Self {
            sys: System::new_with_specifics(
                RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_cpu_usage()),
            ),
        }
    }
}

impl CounterSource for SysinfoCpuIdle {
    fn instance_name(&self) -> &str {
        TOTAL_INSTANCE
    }

    fn next_value(&mut self) -> Result<f64, CounterError> {
        self.sys.refresh_cpu_usage();
        let usage = self.sys.global_cpu_usage() as f64;
        if !usage.is_finite() {
            return Err(CounterError::Read {
                instance: TOTAL_INSTANCE.into(),
                reason: format!("cpu usage not finite: {}", usage),
            });
        }
        Ok((100.0 - usage).clamp(0.0, 100.0))
    }
}

struct SysinfoMemory {
    sys: System,
}

impl SysinfoMemory {
    fn new() -> Self {
        Self {
            sys: System::new_with_specifics(
                RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
            ),
        }
    }

    fn total_bytes(&self) -> u64 {
        self.sys.total_memory()
    }
}

impl MemoryGauge for SysinfoMemory {
    fn used_bytes(&mut self) -> Result<u64, CounterError> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        let available = self.sys.available_memory();
        Ok(total.saturating_sub(available))
    }
}
