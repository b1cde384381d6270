// Window aggregation: turns the bracketing snapshots of a window into utilization fractions.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::elapsed_secs;
use crate::error::UtilizationError;
use crate::models::{Snapshot, SystemResources, Utilization};

/// Computes utilization from `snapshots` (oldest first, as returned by
/// `SnapshotRing::snapshots_within`).
///
/// CPU and disk busy time are cumulative, so they are the endpoint delta divided by elapsed
/// time. Memory is instantaneous and averaged across every snapshot in the span.
pub fn compute_utilization(
    window: Duration,
    snapshots: &[Arc<Snapshot>],
    resources: &SystemResources,
) -> Result<Utilization, UtilizationError> {
    let (Some(first), Some(last)) = (snapshots.first(), snapshots.last()) else {
        return Err(UtilizationError::InsufficientData { available: 0 });
    };
    let elapsed = elapsed_secs(first.timestamp, last.timestamp);
    if snapshots.len() < 2 || elapsed <= 0.0 {
        return Err(UtilizationError::InsufficientData {
            available: snapshots.len(),
        });
    }

    let cpu_used_fraction = fraction(last.cpu_time_consumed - first.cpu_time_consumed, elapsed);

    let memory_used_bytes = mean_u64(snapshots.iter().map(|s| s.memory_used));
    let memory_used_fraction = if resources.total_memory_bytes > 0 {
        (memory_used_bytes as f64 / resources.total_memory_bytes as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let per_disk_busy_fraction = last
        .per_disk_busy_seconds
        .iter()
        .map(|(disk, end)| {
            let start = first.per_disk_busy_seconds.get(disk).copied().unwrap_or(0.0);
            (disk.clone(), fraction(end - start, elapsed))
        })
        .collect();

    let per_disk_rates = last
        .per_disk_counter_totals
        .iter()
        .map(|(rate, disks)| {
            let start_totals = first.per_disk_counter_totals.get(rate);
            let per_disk: BTreeMap<String, f64> = disks
                .iter()
                .map(|(disk, end)| {
                    let start = start_totals
                        .and_then(|t| t.get(disk))
                        .copied()
                        .unwrap_or(0);
                    (disk.clone(), end.saturating_sub(start) as f64 / elapsed)
                })
                .collect();
            (*rate, per_disk)
        })
        .collect();

    Ok(Utilization {
        window_requested: window,
        span_start: first.timestamp,
        span_end: last.timestamp,
        cpu_used_fraction,
        memory_used_fraction,
        memory_used_bytes,
        per_disk_busy_fraction,
        per_disk_rates,
        system_resources: *resources,
    })
}

fn fraction(delta: f64, elapsed: f64) -> f64 {
    if !delta.is_finite() {
        return 0.0;
    }
    (delta / elapsed).clamp(0.0, 1.0)
}

fn mean_u64(values: impl Iterator<Item = u64>) -> u64 {
    let (sum, n) = values.fold((0u128, 0u128), |(s, n), v| (s + v as u128, n + 1));
    if n == 0 { 0 } else { (sum / n) as u64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiskRate;
    use chrono::{TimeZone, Utc};

    fn resources() -> SystemResources {
        SystemResources {
            logical_cpus: 2,
            total_memory_bytes: 1000,
        }
    }

    fn snap(secs: i64, cpu: f64, mem: u64, busy: f64, reads: u64) -> Arc<Snapshot> {
        Arc::new(Snapshot {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::seconds(secs),
            cpu_time_consumed: cpu,
            memory_used: mem,
            per_disk_busy_seconds: BTreeMap::from([("sda".to_string(), busy)]),
            per_disk_counter_totals: BTreeMap::from([(
                DiskRate::Reads,
                BTreeMap::from([("sda".to_string(), reads)]),
            )]),
        })
    }

    #[test]
    fn deltas_endpoints_and_averages_memory() {
        let snaps = vec![
            snap(0, 0.0, 200, 0.0, 0),
            snap(10, 5.0, 400, 2.0, 100),
            snap(20, 8.0, 600, 5.0, 400),
        ];
        let u = compute_utilization(Duration::from_secs(20), &snaps, &resources()).unwrap();
        assert!((u.cpu_used_fraction - 0.4).abs() < 1e-12);
        assert_eq!(u.memory_used_bytes, 400);
        assert!((u.memory_used_fraction - 0.4).abs() < 1e-12);
        assert!((u.per_disk_busy_fraction["sda"] - 0.25).abs() < 1e-12);
        assert!((u.per_disk_rates[&DiskRate::Reads]["sda"] - 20.0).abs() < 1e-12);
        assert_eq!(u.window_requested, Duration::from_secs(20));
    }

    #[test]
    fn fractions_are_clamped() {
        let snaps = vec![snap(0, 10.0, 5000, 0.0, 0), snap(10, 30.0, 5000, 50.0, 0)];
        let u = compute_utilization(Duration::from_secs(10), &snaps, &resources()).unwrap();
        assert_eq!(u.cpu_used_fraction, 1.0);
        assert_eq!(u.memory_used_fraction, 1.0);
        assert_eq!(u.per_disk_busy_fraction["sda"], 1.0);
    }

    #[test]
    fn fewer_than_two_snapshots_is_insufficient() {
        let err = compute_utilization(Duration::from_secs(1), &[], &resources()).unwrap_err();
        assert_eq!(err, UtilizationError::InsufficientData { available: 0 });
        let one = vec![snap(0, 0.0, 0, 0.0, 0)];
        let err = compute_utilization(Duration::from_secs(1), &one, &resources()).unwrap_err();
        assert_eq!(err, UtilizationError::InsufficientData { available: 1 });
    }
}
