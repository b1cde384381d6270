// Error taxonomy: counter reads, engine startup, and caller-facing query errors.

use std::time::Duration;

use thiserror::Error;

/// Failure creating or reading a single counter instance.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CounterError {
    #[error("counter {counter} unavailable for instance '{instance}': {reason}")]
    Unavailable {
        counter: String,
        instance: String,
        reason: String,
    },

    #[error("instance '{instance}' not found")]
    InstanceMissing { instance: String },

    #[error("read failed for instance '{instance}': {reason}")]
    Read { instance: String, reason: String },

    #[error("read for instance '{instance}' exceeded {} ms", timeout.as_millis())]
    TimedOut { instance: String, timeout: Duration },

    #[error("counter {counter} is not supported on this platform")]
    Unsupported { counter: String },
}

/// Fatal errors raised while constructing or starting the engine.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid monitor options: {0}")]
    Config(String),

    #[error("counter subsystem unavailable: {0}")]
    CounterUnavailable(#[source] CounterError),
}

/// Which bound a rejected window violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowBound {
    NonPositive,
    Maximum(Duration),
}

impl std::fmt::Display for WindowBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowBound::NonPositive => write!(f, "window must be > 0"),
            WindowBound::Maximum(max) => {
                write!(f, "window must be <= {} ms", max.as_millis())
            }
        }
    }
}

/// Errors returned synchronously from `get_utilization`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UtilizationError {
    #[error("requested window of {} ms is out of range: {bound}", window.as_millis())]
    WindowOutOfRange { window: Duration, bound: WindowBound },

    #[error("insufficient data: {available} snapshot(s) in range, need at least 2")]
    InsufficientData { available: usize },
}

impl UtilizationError {
    /// Insufficient data clears up once the sampler has ticked; a bad window never does.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UtilizationError::InsufficientData { .. })
    }

    /// Stable machine-readable kind for the HTTP layer.
    pub fn kind(&self) -> &'static str {
        match self {
            UtilizationError::WindowOutOfRange { .. } => "window_out_of_range",
            UtilizationError::InsufficientData { .. } => "insufficient_data",
        }
    }
}
