//! Telemetry for the monitor
//!
//! Structured logs go through `tracing`; counters and gauges live in a
//! Prometheus registry owned by [`MonitorMetrics`] and are served from
//! `GET /metrics`.

pub mod metrics;

pub use metrics::{CycleTimer, MonitorMetrics};

use thiserror::Error;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Metrics encoding error: {0}")]
    EncodingError(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
