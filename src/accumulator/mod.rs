// Per-instance accumulators turning instantaneous counter readings into running totals.
// Only the sampler task owns and mutates them.

mod busy_time;
mod rate;
mod reader;

pub use busy_time::BusyTimeAccumulator;
pub use rate::RateAccumulator;
pub(crate) use reader::BoundedReader;

use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::clock::elapsed_secs;
use crate::counters::{CounterFactory, CounterKind};
use crate::error::CounterError;

/// Read bound used until `with_read_timeout` overrides it.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Failed reads in one tick. `timed_out` is the subset that hit the read timeout.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    pub failed: usize,
    pub timed_out: usize,
}

impl ReadOutcome {
    pub(crate) fn record(&mut self, error: &CounterError) {
        self.failed += 1;
        if matches!(error, CounterError::TimedOut { .. }) {
            self.timed_out += 1;
        }
    }
}

impl AddAssign for ReadOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.failed += rhs.failed;
        self.timed_out += rhs.timed_out;
    }
}

struct Tracked {
    reader: BoundedReader<f64>,
    started: bool,
    last_timestamp: DateTime<Utc>,
    total: f64,
}

/// Shared bookkeeping: one counter, timestamp and total per instance.
struct InstanceTotals {
    kind: CounterKind,
    instances: Vec<String>,
    read_timeout: Duration,
    tracked: Vec<Tracked>,
}

impl InstanceTotals {
    fn new(kind: CounterKind, instances: &[String]) -> Self {
        Self {
            kind,
            instances: instances.to_vec(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            tracked: Vec::with_capacity(instances.len()),
        }
    }

    /// Creates every counter, then reads each once and discards the value so the first
    /// accumulated delta is not polluted by counter start-up.
    fn initialize(
        &mut self,
        factory: &dyn CounterFactory,
        now: DateTime<Utc>,
    ) -> Result<(), CounterError> {
        let mut tracked = Vec::with_capacity(self.instances.len());
        for instance in &self.instances {
            let mut counter = factory.create_counter(self.kind, instance)?;
            let reader = BoundedReader::spawn(
                self.kind.as_str(),
                instance,
                self.read_timeout,
                move || counter.next_value(),
            )?;
            tracked.push(Tracked {
                reader,
                started: false,
                last_timestamp: now,
                total: 0.0,
            });
        }
        self.tracked = tracked;

        self.begin_reads();
        let deadline = Instant::now() + self.read_timeout;
        for t in &mut self.tracked {
            if let Err(e) = t.reader.finish(t.started, deadline) {
                tracing::warn!(
                    error = %e,
                    counter = %self.kind,
                    instance = t.reader.instance(),
                    "baseline read failed"
                );
            }
        }
        Ok(())
    }

    /// Starts one read per instance without waiting for any of them.
    fn begin_reads(&mut self) {
        for t in &mut self.tracked {
            t.started = t.reader.begin();
        }
    }

    /// Adds `convert(reading, elapsed_secs)` to each instance's total. A failed, timed-out or
    /// still-outstanding read leaves the total unchanged and still moves the timestamp, so the
    /// gap is not back-filled later.
    fn complete_reads(
        &mut self,
        now: DateTime<Utc>,
        deadline: Instant,
        convert: impl Fn(f64, f64) -> f64,
    ) -> ReadOutcome {
        let mut outcome = ReadOutcome::default();
        for t in &mut self.tracked {
            let elapsed = elapsed_secs(t.last_timestamp, now);
            match t.reader.finish(t.started, deadline) {
                Ok(value) => t.total += convert(value, elapsed),
                Err(e) => {
                    outcome.record(&e);
                    tracing::warn!(
                        error = %e,
                        counter = %self.kind,
                        instance = t.reader.instance(),
                        "counter read failed; keeping previous total"
                    );
                }
            }
            t.started = false;
            t.last_timestamp = now;
        }
        outcome
    }

    fn tick(&mut self, now: DateTime<Utc>, convert: impl Fn(f64, f64) -> f64) -> ReadOutcome {
        self.begin_reads();
        let deadline = Instant::now() + self.read_timeout;
        self.complete_reads(now, deadline, convert)
    }

    fn totals(&self) -> BTreeMap<String, f64> {
        self.tracked
            .iter()
            .map(|t| (t.reader.instance().to_string(), t.total))
            .collect()
    }

    fn total(&self, instance: &str) -> Option<f64> {
        self.tracked
            .iter()
            .find(|t| t.reader.instance() == instance)
            .map(|t| t.total)
    }
}
