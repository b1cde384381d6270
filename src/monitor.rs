// Resource monitor facade: validates the requested window and aggregates over the ring.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::instrument;

use crate::aggregator::compute_utilization;
use crate::clock::TimeProvider;
use crate::counters::CounterFactory;
use crate::error::{MonitorError, UtilizationError, WindowBound};
use crate::models::{SystemResources, Utilization};
use crate::options::MonitorOptions;
use crate::ring::SnapshotRing;
use crate::sampler::{self, Sampler, SamplerStats, SamplerTaskConfig};

/// Default period of the "sampler stats" log line.
pub const DEFAULT_STATS_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Stopped,
    Running,
}

/// Query surface. Cheap to share behind an `Arc`; queries never block the sampler beyond
/// the ring's short read lock.
pub struct ResourceMonitor {
    max_window: Duration,
    ring: Arc<SnapshotRing>,
    resources: SystemResources,
    stats: Arc<SamplerStats>,
    running: Arc<AtomicBool>,
}

/// Owner of the running sampler task.
pub struct SamplerHandle {
    shutdown_tx: oneshot::Sender<()>,
    join: tokio::task::JoinHandle<()>,
}

impl SamplerHandle {
    /// Halts the periodic task and waits for it to release its counters.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.join.await {
            tracing::warn!(error = %e, operation = "sampler_stop", "sampler task join failed");
        }
    }
}

impl ResourceMonitor {
    /// Validates `options`, creates every counter and commits the baseline snapshot.
    /// The returned sampler has not started ticking; drive it by hand or pass it to
    /// `sampler::spawn` (which `start` does).
    pub fn prepare(
        options: &MonitorOptions,
        factory: &dyn CounterFactory,
        clock: Arc<dyn TimeProvider>,
    ) -> Result<(Self, Sampler), MonitorError> {
        options.validate()?;
        let resources = factory
            .system_resources()
            .map_err(MonitorError::CounterUnavailable)?;
        let ring = Arc::new(SnapshotRing::new(options.ring_capacity()));
        let stats = Arc::new(SamplerStats::default());
        let sampler = Sampler::initialize(options, factory, clock, ring.clone(), stats.clone())?;
        let monitor = Self {
            max_window: options.max_window,
            ring,
            resources,
            stats,
            running: Arc::new(AtomicBool::new(false)),
        };
        Ok((monitor, sampler))
    }

    /// Prepares the engine and spawns the sampler on the current tokio runtime.
    pub fn start(
        options: &MonitorOptions,
        factory: &dyn CounterFactory,
        clock: Arc<dyn TimeProvider>,
        stats_log_interval: Duration,
    ) -> Result<(Arc<Self>, SamplerHandle), MonitorError> {
        let (monitor, sampler) = Self::prepare(options, factory, clock)?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = sampler::spawn(
            sampler,
            SamplerTaskConfig {
                sampling_interval: options.sampling_interval,
                stats_log_interval,
            },
            monitor.running.clone(),
            shutdown_rx,
        );
        Ok((Arc::new(monitor), SamplerHandle { shutdown_tx, join }))
    }

    /// Average utilization over the trailing `window`, anchored at the newest snapshot.
    #[instrument(skip(self), fields(window_ms = window.as_millis() as u64))]
    pub fn get_utilization(&self, window: Duration) -> Result<Utilization, UtilizationError> {
        if window.is_zero() {
            return Err(UtilizationError::WindowOutOfRange {
                window,
                bound: WindowBound::NonPositive,
            });
        }
        if window > self.max_window {
            return Err(UtilizationError::WindowOutOfRange {
                window,
                bound: WindowBound::Maximum(self.max_window),
            });
        }
        let Some(latest) = self.ring.latest() else {
            return Err(UtilizationError::InsufficientData { available: 0 });
        };
        let snapshots = self.ring.snapshots_within(window, latest.timestamp);
        compute_utilization(window, &snapshots, &self.resources)
    }

    pub fn max_window(&self) -> Duration {
        self.max_window
    }

    pub fn resources(&self) -> SystemResources {
        self.resources
    }

    pub fn stats(&self) -> &SamplerStats {
        &self.stats
    }

    pub fn snapshot_count(&self) -> usize {
        self.ring.len()
    }

    pub fn state(&self) -> SamplerState {
        if self.running.load(Ordering::Acquire) {
            SamplerState::Running
        } else {
            SamplerState::Stopped
        }
    }
}
