// Snapshot sampler: initializes every accumulator, commits a baseline, then on each tick
// reads all counters once and appends one snapshot to the ring.
// The periodic task follows the Stopped -> Running -> Stopped lifecycle; it is the only writer.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::oneshot;
use tokio::time::{Duration, Instant, interval, interval_at};
use tracing::Instrument;

use crate::accumulator::{BoundedReader, BusyTimeAccumulator, RateAccumulator, ReadOutcome};
use crate::clock::TimeProvider;
use crate::counters::{CounterFactory, CounterKind, TOTAL_INSTANCE};
use crate::error::MonitorError;
use crate::models::{DiskRate, Snapshot};
use crate::options::MonitorOptions;
use crate::ring::SnapshotRing;

/// Counters the sampler task bumps; read by the facade and the periodic stats log.
#[derive(Debug, Default)]
pub struct SamplerStats {
    snapshots_taken: AtomicU64,
    read_failures: AtomicU64,
    timed_out_reads: AtomicU64,
}

impl SamplerStats {
    pub fn snapshots_taken(&self) -> u64 {
        self.snapshots_taken.load(Ordering::Relaxed)
    }

    /// Failed reads of any kind, timeouts included.
    pub fn read_failures(&self) -> u64 {
        self.read_failures.load(Ordering::Relaxed)
    }

    pub fn timed_out_reads(&self) -> u64 {
        self.timed_out_reads.load(Ordering::Relaxed)
    }

    fn record(&self, outcome: ReadOutcome) {
        if outcome.failed > 0 {
            self.read_failures
                .fetch_add(outcome.failed as u64, Ordering::Relaxed);
        }
        if outcome.timed_out > 0 {
            self.timed_out_reads
                .fetch_add(outcome.timed_out as u64, Ordering::Relaxed);
        }
    }
}

pub struct Sampler {
    clock: Arc<dyn TimeProvider>,
    ring: Arc<SnapshotRing>,
    read_timeout: Duration,
    cpu: BusyTimeAccumulator,
    memory: BoundedReader<u64>,
    last_memory_used: u64,
    disk_busy: BusyTimeAccumulator,
    disk_rates: Vec<(DiskRate, RateAccumulator)>,
    stats: Arc<SamplerStats>,
}

impl Sampler {
    /// Creates and baselines every counter, then commits the first snapshot.
    /// Any counter that cannot be created, and a memory gauge that cannot be read, aborts
    /// with `CounterUnavailable`.
    pub fn initialize(
        options: &MonitorOptions,
        factory: &dyn CounterFactory,
        clock: Arc<dyn TimeProvider>,
        ring: Arc<SnapshotRing>,
        stats: Arc<SamplerStats>,
    ) -> Result<Self, MonitorError> {
        options.validate()?;
        let read_timeout = options.read_timeout;

        let mut cpu =
            BusyTimeAccumulator::new(CounterKind::CpuIdleTime, &[TOTAL_INSTANCE.into()])
                .with_read_timeout(read_timeout);
        let mut disk_busy =
            BusyTimeAccumulator::new(CounterKind::DiskIdleTime, &options.disk_instances)
                .with_read_timeout(read_timeout);
        let mut disk_rates: Vec<(DiskRate, RateAccumulator)> = options
            .disk_rates
            .iter()
            .map(|rate| {
                (
                    *rate,
                    RateAccumulator::new(rate.counter_kind(), &options.disk_instances)
                        .with_read_timeout(read_timeout),
                )
            })
            .collect();
        let mut gauge = factory
            .create_memory_gauge()
            .map_err(MonitorError::CounterUnavailable)?;
        let mut memory =
            BoundedReader::spawn("memory_used", TOTAL_INSTANCE, read_timeout, move || {
                gauge.used_bytes()
            })
            .map_err(MonitorError::CounterUnavailable)?;

        let now = clock.now();
        cpu.initialize(factory, now)
            .map_err(MonitorError::CounterUnavailable)?;
        disk_busy
            .initialize(factory, now)
            .map_err(MonitorError::CounterUnavailable)?;
        for (_, acc) in &mut disk_rates {
            acc.initialize(factory, now)
                .map_err(MonitorError::CounterUnavailable)?;
        }
        // A made-up baseline would be averaged into every window that reaches back this far.
        let last_memory_used = memory.read().map_err(MonitorError::CounterUnavailable)?;

        let sampler = Self {
            clock,
            ring,
            read_timeout,
            cpu,
            memory,
            last_memory_used,
            disk_busy,
            disk_rates,
            stats,
        };
        sampler.commit(sampler.snapshot(now));
        tracing::debug!(
            disks = options.disk_instances.len(),
            rate_counters = options.disk_rates.len(),
            "sampler initialized"
        );
        Ok(sampler)
    }

    /// Reads every counter exactly once and appends the resulting snapshot. All reads run
    /// concurrently and share one `read_timeout` deadline; an instance that misses it
    /// flat-lines for this tick while the others still land. Returns `None` when the ring
    /// rejected the snapshot (timestamp not newer than the previous one).
    pub fn tick(&mut self) -> Option<Arc<Snapshot>> {
        let now = self.clock.now();
        self.cpu.begin_reads();
        self.disk_busy.begin_reads();
        for (_, acc) in &mut self.disk_rates {
            acc.begin_reads();
        }
        let memory_started = self.memory.begin();
        let deadline = std::time::Instant::now() + self.read_timeout;

        let mut outcome = self.cpu.complete_reads(now, deadline);
        outcome += self.disk_busy.complete_reads(now, deadline);
        for (_, acc) in &mut self.disk_rates {
            outcome += acc.complete_reads(now, deadline);
        }
        match self.memory.finish(memory_started, deadline) {
            Ok(used) => self.last_memory_used = used,
            Err(e) => {
                outcome.record(&e);
                tracing::warn!(
                    error = %e,
                    operation = "memory_used",
                    "memory read failed; keeping previous value"
                );
            }
        }
        self.stats.record(outcome);
        self.commit(self.snapshot(now))
    }

    fn snapshot(&self, now: chrono::DateTime<chrono::Utc>) -> Snapshot {
        let per_disk_counter_totals: BTreeMap<DiskRate, BTreeMap<String, u64>> = self
            .disk_rates
            .iter()
            .map(|(rate, acc)| (*rate, acc.whole_totals()))
            .collect();
        Snapshot {
            timestamp: now,
            cpu_time_consumed: self.cpu.total(TOTAL_INSTANCE).unwrap_or(0.0),
            memory_used: self.last_memory_used,
            per_disk_busy_seconds: self.disk_busy.totals(),
            per_disk_counter_totals,
        }
    }

    fn commit(&self, snapshot: Snapshot) -> Option<Arc<Snapshot>> {
        let snapshot = Arc::new(snapshot);
        if self.ring.append(snapshot.clone()) {
            self.stats.snapshots_taken.fetch_add(1, Ordering::Relaxed);
            Some(snapshot)
        } else {
            None
        }
    }
}

/// Timing for the periodic task.
pub struct SamplerTaskConfig {
    pub sampling_interval: Duration,
    pub stats_log_interval: Duration,
}

/// Runs `sampler` every `sampling_interval` until `shutdown_rx` fires. Ticks never overlap:
/// one that overruns the interval makes the next scheduled tick be skipped, not queued.
/// `running` is cleared when the loop exits; dropping the sampler there releases every
/// counter whose read is not still outstanding.
pub fn spawn(
    sampler: Sampler,
    config: SamplerTaskConfig,
    running: Arc<AtomicBool>,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let SamplerTaskConfig {
        sampling_interval,
        stats_log_interval,
    } = config;
    let stats = sampler.stats.clone();
    let mut sampler = Some(sampler);
    running.store(true, Ordering::Release);

    let sampler_span = tracing::span!(
        tracing::Level::DEBUG,
        "sampler",
        sampling_interval_ms = sampling_interval.as_millis() as u64
    );

    tokio::spawn(
        async move {
            // The baseline was committed during initialize; the first real tick is one period out.
            let mut tick = interval_at(Instant::now() + sampling_interval, sampling_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut stats_log_tick = interval(stats_log_interval);
            stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!("sampler started");

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let Some(mut job) = sampler.take() else {
                            break;
                        };
                        let result = tokio::task::spawn_blocking(move || {
                            let appended = job.tick().is_some();
                            (job, appended)
                        })
                        .await;
                        match result {
                            Ok((job, _)) => sampler = Some(job),
                            Err(e) => {
                                tracing::warn!(error = %e, operation = "sampler_tick", "tick task failed; stopping sampler");
                                break;
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("sampler shutting down");
                        break;
                    }
                    _ = stats_log_tick.tick() => {
                        tracing::info!(
                            snapshots_taken = stats.snapshots_taken(),
                            read_failures = stats.read_failures(),
                            timed_out_reads = stats.timed_out_reads(),
                            "sampler stats"
                        );
                    }
                }
            }
            drop(sampler);
            running.store(false, Ordering::Release);
            tracing::info!("sampler stopped");
        }
        .instrument(sampler_span),
    )
}
