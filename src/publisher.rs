// Utilization publisher: computes the configured window on a fixed period and broadcasts it.

use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};
use tokio::time::{Duration, Instant, interval_at};

use crate::error::UtilizationError;
use crate::models::Utilization;
use crate::monitor::ResourceMonitor;

/// Rate limit for "no receivers" debug line.
const NO_RECEIVERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Publishes `get_utilization(window)` every `window` until `shutdown_rx` fires.
pub fn spawn(
    monitor: Arc<ResourceMonitor>,
    window: Duration,
    tx: broadcast::Sender<Utilization>,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval_at(Instant::now() + window, window);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_no_receivers_log: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match monitor.get_utilization(window) {
                        Ok(utilization) => {
                            if tx.send(utilization).is_err() {
                                let should_log = last_no_receivers_log
                                    .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_LOG_INTERVAL);
                                if should_log {
                                    tracing::debug!(
                                        operation = "publish_utilization",
                                        "No active subscribers; broadcast channel has no receivers"
                                    );
                                    last_no_receivers_log = Some(Instant::now());
                                }
                            }
                        }
                        Err(e @ UtilizationError::InsufficientData { .. }) => {
                            tracing::debug!(error = %e, operation = "publish_utilization", "skipped");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, operation = "publish_utilization", "utilization failed");
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("publisher shutting down");
                    break;
                }
            }
        }
    })
}
