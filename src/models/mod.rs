// Domain models: snapshots, utilization results, system resources

mod resources;
mod snapshot;
mod utilization;

pub use resources::SystemResources;
pub use snapshot::{DiskRate, Snapshot};
pub use utilization::Utilization;
