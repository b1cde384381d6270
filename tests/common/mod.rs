// Shared test helpers
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use resmon::counters::fake::FakeCounterFactory;
use resmon::counters::{CounterKind, TOTAL_INSTANCE};
use resmon::models::{DiskRate, SystemResources};
use resmon::options::MonitorOptions;
use std::time::Duration;

pub const TICK: Duration = Duration::from_secs(60);

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn resources() -> SystemResources {
    SystemResources {
        logical_cpus: 8,
        total_memory_bytes: 1000,
    }
}

/// One disk "C:" with a 60s cadence. Readings start with the discarded baseline.
pub fn scripted_factory() -> FakeCounterFactory {
    FakeCounterFactory::new(resources())
        .with_counter(
            CounterKind::CpuIdleTime,
            TOTAL_INSTANCE,
            &[100.0, 50.0, 50.0, 50.0, 50.0],
        )
        .with_memory(&[100, 200, 300, 400, 500])
        .with_counter(CounterKind::DiskIdleTime, "C:", &[100.0, 0.0, 0.0, 50.0, 50.0])
        .with_counter(CounterKind::DiskReads, "C:", &[0.0, 1.0, 1.5, 2.0, 2.5])
        .with_counter(
            CounterKind::DiskWriteBytes,
            "C:",
            &[0.0, 100.0, 150.5, 20.0, 3.1416],
        )
}

pub fn options() -> MonitorOptions {
    MonitorOptions {
        sampling_interval: TICK,
        max_window: Duration::from_secs(300),
        disk_instances: vec!["C:".into()],
        disk_rates: vec![DiskRate::Reads, DiskRate::WriteBytes],
        read_timeout: Duration::from_secs(1),
    }
}
