use std::time::Duration;

use serde::Deserialize;

use crate::models::DiskRate;
use crate::options::MonitorOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub disks: DisksConfig,
    pub publishing: PublishingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub sample_interval_ms: u64,
    /// Largest window a query may ask for; sizes the snapshot ring.
    pub max_window_ms: u64,
    /// Bound on one tick's counter reads; a slower tick is skipped.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// How often to log sampler stats at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisksConfig {
    #[serde(default)]
    pub instances: Vec<String>,
    #[serde(default = "default_rate_counters")]
    pub rate_counters: Vec<DiskRate>,
}

impl Default for DisksConfig {
    fn default() -> Self {
        Self {
            instances: Vec::new(),
            rate_counters: default_rate_counters(),
        }
    }
}

fn default_rate_counters() -> Vec<DiskRate> {
    DiskRate::ALL.to_vec()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Window published to /ws/utilization subscribers, also the publishing period.
    pub window_ms: u64,
    /// Max number of results kept in the broadcast channel (slow clients may lag).
    pub broadcast_capacity: usize,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.monitoring.sample_interval_ms > 0,
            "monitoring.sample_interval_ms must be > 0, got {}",
            self.monitoring.sample_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.max_window_ms >= self.monitoring.sample_interval_ms,
            "monitoring.max_window_ms must be >= monitoring.sample_interval_ms, got {} < {}",
            self.monitoring.max_window_ms,
            self.monitoring.sample_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.read_timeout_ms > 0,
            "monitoring.read_timeout_ms must be > 0, got {}",
            self.monitoring.read_timeout_ms
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.publishing.window_ms > 0,
            "publishing.window_ms must be > 0, got {}",
            self.publishing.window_ms
        );
        anyhow::ensure!(
            self.publishing.window_ms <= self.monitoring.max_window_ms,
            "publishing.window_ms must be <= monitoring.max_window_ms, got {} > {}",
            self.publishing.window_ms,
            self.monitoring.max_window_ms
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        self.monitor_options().validate()?;
        Ok(())
    }

    pub fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions {
            sampling_interval: Duration::from_millis(self.monitoring.sample_interval_ms),
            max_window: Duration::from_millis(self.monitoring.max_window_ms),
            disk_instances: self.disks.instances.clone(),
            disk_rates: self.disks.rate_counters.clone(),
            read_timeout: Duration::from_millis(self.monitoring.read_timeout_ms),
        }
    }

    pub fn stats_log_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring.stats_log_interval_secs)
    }

    pub fn publishing_window(&self) -> Duration {
        Duration::from_millis(self.publishing.window_ms)
    }
}
