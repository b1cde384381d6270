// Engine options. Built from the `[monitoring]`/`[disks]` config sections or directly by embedders.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::MonitorError;
use crate::models::DiskRate;

/// Slots beyond `max_window / sampling_interval`: one for the snapshot preceding the window
/// boundary, one for a tick landing late.
const RING_SLACK: usize = 2;

/// Most snapshots a ring may be sized for.
pub const MAX_RING_CAPACITY: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorOptions {
    pub sampling_interval: Duration,
    /// Largest window `get_utilization` accepts; also sizes the ring.
    pub max_window: Duration,
    pub disk_instances: Vec<String>,
    pub disk_rates: Vec<DiskRate>,
    /// Upper bound on one sampler tick's counter reads.
    pub read_timeout: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            sampling_interval: Duration::from_secs(1),
            max_window: Duration::from_secs(5),
            disk_instances: Vec::new(),
            disk_rates: DiskRate::ALL.to_vec(),
            read_timeout: Duration::from_secs(1),
        }
    }
}

impl MonitorOptions {
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.sampling_interval.is_zero() {
            return Err(MonitorError::Config(
                "sampling_interval must be > 0".into(),
            ));
        }
        if self.max_window < self.sampling_interval {
            return Err(MonitorError::Config(format!(
                "max_window ({} ms) must be >= sampling_interval ({} ms)",
                self.max_window.as_millis(),
                self.sampling_interval.as_millis()
            )));
        }
        let capacity = self.ring_capacity();
        if capacity > MAX_RING_CAPACITY {
            return Err(MonitorError::Config(format!(
                "max_window / sampling_interval needs {} snapshots, at most {} allowed",
                capacity, MAX_RING_CAPACITY
            )));
        }
        if self.read_timeout.is_zero() {
            return Err(MonitorError::Config("read_timeout must be > 0".into()));
        }
        let mut seen = HashSet::new();
        for disk in &self.disk_instances {
            if disk.trim().is_empty() {
                return Err(MonitorError::Config(
                    "disk instance names must be non-empty".into(),
                ));
            }
            if !seen.insert(disk.as_str()) {
                return Err(MonitorError::Config(format!(
                    "disk instance '{}' listed twice",
                    disk
                )));
            }
        }
        let rates: HashSet<_> = self.disk_rates.iter().collect();
        if rates.len() != self.disk_rates.len() {
            return Err(MonitorError::Config("disk rate counters listed twice".into()));
        }
        Ok(())
    }

    /// `ceil(max_window / sampling_interval) + slack`.
    pub fn ring_capacity(&self) -> usize {
        let interval = self.sampling_interval.as_nanos().max(1);
        let slots = self.max_window.as_nanos().div_ceil(interval);
        usize::try_from(slots)
            .unwrap_or(usize::MAX)
            .saturating_add(RING_SLACK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_up_and_adds_slack() {
        let opts = MonitorOptions {
            sampling_interval: Duration::from_millis(300),
            max_window: Duration::from_secs(1),
            ..Default::default()
        };
        assert_eq!(opts.ring_capacity(), 4 + 2);
    }

    #[test]
    fn rejects_window_smaller_than_interval() {
        let opts = MonitorOptions {
            sampling_interval: Duration::from_secs(10),
            max_window: Duration::from_secs(5),
            ..Default::default()
        };
        let err = opts.validate().unwrap_err();
        assert!(err.to_string().contains("max_window"));
    }

    #[test]
    fn rejects_window_needing_too_many_snapshots() {
        let opts = MonitorOptions {
            sampling_interval: Duration::from_millis(1),
            max_window: Duration::from_millis(u64::MAX),
            ..Default::default()
        };
        let err = opts.validate().unwrap_err();
        assert!(err.to_string().contains("at most 1000000"));

        let day_at_1ms = MonitorOptions {
            sampling_interval: Duration::from_millis(1),
            max_window: Duration::from_secs(86_400),
            ..Default::default()
        };
        assert!(day_at_1ms.validate().is_err());
    }

    #[test]
    fn largest_allowed_capacity_is_accepted() {
        let opts = MonitorOptions {
            sampling_interval: Duration::from_millis(1),
            max_window: Duration::from_millis((MAX_RING_CAPACITY - 2) as u64),
            ..Default::default()
        };
        assert_eq!(opts.ring_capacity(), MAX_RING_CAPACITY);
        opts.validate().unwrap();
    }

    #[test]
    fn rejects_duplicate_disks() {
        let opts = MonitorOptions {
            disk_instances: vec!["sda".into(), "sda".into()],
            ..Default::default()
        };
        assert!(matches!(opts.validate(), Err(MonitorError::Config(_))));
    }

    #[test]
    fn defaults_are_valid() {
        MonitorOptions::default().validate().unwrap();
    }
}
