// Windowed resource utilization: counter sampling, the snapshot ring and the
// `ResourceMonitor` query facade, plus the HTTP surface the binary serves.

pub mod accumulator;
pub mod aggregator;
pub mod clock;
pub mod config;
pub mod counters;
pub mod error;
pub mod models;
pub mod monitor;
pub mod options;
pub mod publisher;
pub mod ring;
pub mod routes;
pub mod sampler;
pub mod version;
