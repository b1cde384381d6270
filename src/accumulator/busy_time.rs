// Idle-percentage counter → cumulative busy seconds.

use std::collections::BTreeMap;

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use super::{InstanceTotals, ReadOutcome};
use crate::counters::{CounterFactory, CounterKind};
use crate::error::CounterError;

/// Busy time is the complement of the idle percentage times wall-clock elapsed,
/// so a delayed tick contributes proportionally more.
pub struct BusyTimeAccumulator {
    inner: InstanceTotals,
}

impl BusyTimeAccumulator {
    /// `kind` must be an idle-percentage counter.
    pub fn new(kind: CounterKind, instances: &[String]) -> Self {
        Self {
            inner: InstanceTotals::new(kind, instances),
        }
    }

    /// Bound on each counter read, baseline read included.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.inner.read_timeout = timeout;
        self
    }

    pub fn initialize(
        &mut self,
        factory: &dyn CounterFactory,
        now: DateTime<Utc>,
    ) -> Result<(), CounterError> {
        self.inner.initialize(factory, now)
    }

    /// Reads every instance once, each bounded by the read timeout.
    pub fn tick(&mut self, now: DateTime<Utc>) -> ReadOutcome {
        self.inner.tick(now, busy_seconds)
    }

    /// First half of a tick: starts every read without waiting.
    pub fn begin_reads(&mut self) {
        self.inner.begin_reads();
    }

    /// Second half of a tick: collects the reads started by `begin_reads`, waiting no
    /// later than `deadline` for any of them.
    pub fn complete_reads(&mut self, now: DateTime<Utc>, deadline: Instant) -> ReadOutcome {
        self.inner.complete_reads(now, deadline, busy_seconds)
    }

    /// Cumulative busy seconds per instance.
    pub fn totals(&self) -> BTreeMap<String, f64> {
        self.inner.totals()
    }

    pub fn total(&self, instance: &str) -> Option<f64> {
        self.inner.total(instance)
    }
}

fn busy_seconds(idle_percent: f64, elapsed_secs: f64) -> f64 {
    let idle = if idle_percent.is_finite() {
        (idle_percent / 100.0).clamp(0.0, 1.0)
    } else {
        1.0
    };
    (1.0 - idle) * elapsed_secs
}
