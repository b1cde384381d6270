// Per-second counter → running total.

use std::collections::BTreeMap;

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use super::{InstanceTotals, ReadOutcome};
use crate::counters::{CounterFactory, CounterKind};
use crate::error::CounterError;

/// Integrates a per-second rate over the wall-clock time since the previous tick.
/// A 60 s gap contributes 60× the reading.
pub struct RateAccumulator {
    inner: InstanceTotals,
}

impl RateAccumulator {
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

    pub fn kind(&self) -> CounterKind {
        self.inner.kind
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
        self.inner.tick(now, integrate)
    }

    pub fn begin_reads(&mut self) {
        self.inner.begin_reads();
    }

    pub fn complete_reads(&mut self, now: DateTime<Utc>, deadline: Instant) -> ReadOutcome {
        self.inner.complete_reads(now, deadline, integrate)
    }

    /// Exact running totals.
    pub fn totals(&self) -> BTreeMap<String, f64> {
        self.inner.totals()
    }

    /// Totals truncated to whole operations/bytes, as published in snapshots.
    pub fn whole_totals(&self) -> BTreeMap<String, u64> {
        self.inner
            .totals()
            .into_iter()
            .map(|(k, v)| (k, v.floor() as u64))
            .collect()
    }

    pub fn total(&self, instance: &str) -> Option<f64> {
        self.inner.total(instance)
    }
}

fn integrate(rate: f64, elapsed_secs: f64) -> f64 {
    // Counts never run backwards.
    if rate.is_finite() && rate > 0.0 {
        rate * elapsed_secs
    } else {
        0.0
    }
}
