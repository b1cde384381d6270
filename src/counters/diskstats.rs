// Disk counters derived from successive /proc/diskstats reads.
// Each counter diffs against its own previous row, so the first read only establishes a baseline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::{CounterKind, CounterSource};
use crate::error::CounterError;

pub(super) const PROC_DISKSTATS: &str = "/proc/diskstats";
const SECTOR_BYTES: u64 = 512;

/// The cumulative fields of one /proc/diskstats line the counters need.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskStatsRow {
    pub reads_completed: u64,
    pub sectors_read: u64,
    pub writes_completed: u64,
    pub sectors_written: u64,
    /// Milliseconds the device had I/O in flight.
    pub io_ticks_ms: u64,
}

/// Parse /proc/diskstats content into rows keyed by device name.
///
/// Format (kernel 4.18+):
/// ```text
/// major minor name rd_ios rd_merges rd_sectors rd_ticks wr_ios wr_merges wr_sectors wr_ticks in_flight io_ticks time_in_queue ...
/// ```
pub fn parse_diskstats(content: &str) -> HashMap<String, DiskStatsRow> {
    let mut rows = HashMap::new();
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue;
        }
        let field = |i: usize| parts[i].parse::<u64>().unwrap_or(0);
        rows.insert(
            parts[2].to_string(),
            DiskStatsRow {
                reads_completed: field(3),
                sectors_read: field(5),
                writes_completed: field(7),
                sectors_written: field(9),
                io_ticks_ms: field(12),
            },
        );
    }
    rows
}

fn read_row(path: &Path, instance: &str) -> Result<DiskStatsRow, CounterError> {
    let content = std::fs::read_to_string(path).map_err(|e| CounterError::Read {
        instance: instance.to_string(),
        reason: format!("{}: {}", path.display(), e),
    })?;
    parse_diskstats(&content)
        .remove(instance)
        .ok_or_else(|| CounterError::InstanceMissing {
            instance: instance.to_string(),
        })
}

/// One disk counter (idle % or a per-second rate) for one device.
#[derive(Debug)]
pub struct DiskStatsCounter {
    instance: String,
    kind: CounterKind,
    path: PathBuf,
    previous: Option<(Instant, DiskStatsRow)>,
}

impl DiskStatsCounter {
    /// Fails if the stats file is unreadable or does not list `instance`.
    pub fn open(
        path: impl Into<PathBuf>,
        kind: CounterKind,
        instance: &str,
    ) -> Result<Self, CounterError> {
        let path = path.into();
        if kind == CounterKind::CpuIdleTime {
            return Err(CounterError::Unsupported {
                counter: kind.to_string(),
            });
        }
        read_row(&path, instance).map_err(|e| match e {
            CounterError::InstanceMissing { .. } => e,
            other => CounterError::Unavailable {
                counter: kind.to_string(),
                instance: instance.to_string(),
                reason: other.to_string(),
            },
        })?;
        Ok(Self {
            instance: instance.to_string(),
            kind,
            path,
            previous: None,
        })
    }

    fn derive(&self, prev: &DiskStatsRow, curr: &DiskStatsRow, elapsed_ms: f64) -> f64 {
        let secs = elapsed_ms / 1000.0;
        let per_sec = |delta: u64| delta as f64 / secs;
        match self.kind {
            CounterKind::DiskIdleTime => {
                let busy_ms = curr.io_ticks_ms.saturating_sub(prev.io_ticks_ms) as f64;
                (100.0 - busy_ms / elapsed_ms * 100.0).clamp(0.0, 100.0)
            }
            CounterKind::DiskReads => {
                per_sec(curr.reads_completed.saturating_sub(prev.reads_completed))
            }
            CounterKind::DiskWrites => {
                per_sec(curr.writes_completed.saturating_sub(prev.writes_completed))
            }
            CounterKind::DiskReadBytes => {
                per_sec(curr.sectors_read.saturating_sub(prev.sectors_read) * SECTOR_BYTES)
            }
            CounterKind::DiskWriteBytes => {
                per_sec(curr.sectors_written.saturating_sub(prev.sectors_written) * SECTOR_BYTES)
            }
            CounterKind::CpuIdleTime => 0.0,
        }
    }

    fn idle_default(&self) -> f64 {
        if self.kind == CounterKind::DiskIdleTime {
            100.0
        } else {
            0.0
        }
    }
}

impl CounterSource for DiskStatsCounter {
    fn instance_name(&self) -> &str {
        &self.instance
    }

    fn next_value(&mut self) -> Result<f64, CounterError> {
        let row = read_row(&self.path, &self.instance)?;
        let now = Instant::now();
        let value = match self.previous {
            Some((prev_at, ref prev)) => {
                let elapsed_ms = now.duration_since(prev_at).as_secs_f64() * 1000.0;
                if elapsed_ms > 0.0 {
                    self.derive(prev, &row, elapsed_ms)
                } else {
                    self.idle_default()
                }
            }
            None => self.idle_default(),
        };
        self.previous = Some((now, row));
        Ok(value)
    }
}
