use anyhow::Result;
use resmon::*;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let factory = counters::HostCounterFactory::new();
    let (monitor, sampler_handle) = monitor::ResourceMonitor::start(
        &app_config.monitor_options(),
        &factory,
        Arc::new(clock::SystemClock),
        app_config.stats_log_interval(),
    )
    .map_err(|e| anyhow::anyhow!("resource monitor: {}", e))?;
    let resources = monitor.resources();
    tracing::info!(
        logical_cpus = resources.logical_cpus,
        total_memory_bytes = resources.total_memory_bytes,
        disks = ?app_config.disks.instances,
        "resource monitor running"
    );

    let (tx, _) =
        broadcast::channel::<models::Utilization>(app_config.publishing.broadcast_capacity);
    let (publisher_shutdown_tx, publisher_shutdown_rx) = tokio::sync::oneshot::channel();
    let publisher_handle = publisher::spawn(
        monitor.clone(),
        app_config.publishing_window(),
        tx.clone(),
        publisher_shutdown_rx,
    );

    let ws_clients = Arc::new(AtomicUsize::new(0));
    let app = routes::app(monitor, tx, ws_clients);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
        }
    }

    let _ = publisher_shutdown_tx.send(());
    let _ = publisher_handle.await;
    sampler_handle.stop().await;
    Ok(())
}
