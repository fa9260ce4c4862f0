//! Prometheus metrics for the monitor
//!
//! - `tailnet_watch_cycles_total` (counter) - cycles by outcome
//! - `tailnet_watch_alerts_total` (counter) - alerts by kind and delivery result
//! - `tailnet_watch_store_errors_total` (counter) - failed store reads/writes
//! - `tailnet_watch_devices` (gauge) - monitored devices by observed state
//! - `tailnet_watch_cycle_duration_seconds` (histogram) - cycle wall time

use prometheus::{CounterVec, GaugeVec, Histogram, HistogramOpts, Opts, Registry};
use std::time::Instant;

use super::{Result, TelemetryError};

const NAMESPACE: &str = "tailnet_watch";

/// Monitor metrics and the registry they are registered with
pub struct MonitorMetrics {
    registry: Registry,
    cycles_total: CounterVec,
    alerts_total: CounterVec,
    store_errors_total: CounterVec,
    devices: GaugeVec,
    cycle_duration_seconds: Histogram,
}

impl MonitorMetrics {
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Register all metrics with `registry`
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let cycles_total = CounterVec::new(
            Opts::new("cycles_total", "Reconciliation cycles by outcome").namespace(NAMESPACE),
            &["outcome"],
        )?;

        let alerts_total = CounterVec::new(
            Opts::new("alerts_total", "Alerts by kind and delivery result").namespace(NAMESPACE),
            &["kind", "result"],
        )?;

        let store_errors_total = CounterVec::new(
            Opts::new("store_errors_total", "Failed status store operations").namespace(NAMESPACE),
            &["op"],
        )?;

        let devices = GaugeVec::new(
            Opts::new("devices", "Monitored devices by state in the last cycle")
                .namespace(NAMESPACE),
            &["state"],
        )?;

        let cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("cycle_duration_seconds", "Reconciliation cycle duration")
                .namespace(NAMESPACE)
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(alerts_total.clone()))?;
        registry.register(Box::new(store_errors_total.clone()))?;
        registry.register(Box::new(devices.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            cycles_total,
            alerts_total,
            store_errors_total,
            devices,
            cycle_duration_seconds,
        })
    }

    pub fn record_cycle(&self, outcome: &str) {
        self.cycles_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_alert(&self, kind: &str, delivered: bool) {
        let result = if delivered { "delivered" } else { "failed" };
        self.alerts_total.with_label_values(&[kind, result]).inc();
    }

    /// `op` is `read` or `write`
    pub fn record_store_error(&self, op: &str) {
        self.store_errors_total.with_label_values(&[op]).inc();
    }

    pub fn set_devices(&self, online: usize, offline: usize) {
        self.devices.with_label_values(&["online"]).set(online as f64);
        self.devices.with_label_values(&["offline"]).set(offline as f64);
    }

    /// Start a cycle timer; the duration is recorded when it drops
    pub fn start_cycle(&self) -> CycleTimer<'_> {
        CycleTimer {
            start: Instant::now(),
            metrics: self,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::EncodingError(e.to_string()))
    }
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create monitor metrics registry")
    }
}

impl std::fmt::Debug for MonitorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorMetrics").finish_non_exhaustive()
    }
}

/// RAII guard timing one cycle
pub struct CycleTimer<'a> {
    start: Instant,
    metrics: &'a MonitorMetrics,
}

impl<'a> CycleTimer<'a> {
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl<'a> Drop for CycleTimer<'a> {
    fn drop(&mut self) {
        self.metrics
            .cycle_duration_seconds
            .observe(self.start.elapsed().as_secs_f64());
    }
}
