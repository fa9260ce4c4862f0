//! Reconciliation cycle
//!
//! One [`Monitor::run_cycle`] call fetches the device list, applies the tag
//! filter, and reconciles each monitored device against its stored status.
//! Per-device failures are logged and counted, never propagated.

mod scheduler;

pub use scheduler::run_scheduled;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tailnet_watch_core::{
    reconcile, Device, DeviceObservation, KvStore, NodeStatus, StatusStore, TagFilter,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::client::{DeviceSource, TailscaleClient, TokenCache};
use crate::config::MonitorConfig;
use crate::notifier::{format_alert, format_source_failure, Notifier, TelegramNotifier};
use crate::telemetry::MonitorMetrics;

/// The subset of configuration a cycle needs
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub offline_threshold_minutes: u64,
    pub reminder_interval_minutes: u64,
    pub tag_filter: TagFilter,
    pub parallel: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            offline_threshold_minutes: config.offline_threshold_minutes,
            reminder_interval_minutes: config.reminder_interval_minutes,
            tag_filter: config.tag_filter(),
            parallel: config.parallel,
        }
    }
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed,
    SourceFailed { error: String },
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Completed => "completed",
            CycleOutcome::SourceFailed { .. } => "source_failed",
        }
    }
}

/// Counters for one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    #[serde(flatten)]
    pub outcome: CycleOutcome,
    /// Devices returned by the source
    pub fetched: usize,
    /// Devices left after filtering and de-duplication
    pub monitored: usize,
    pub online: usize,
    pub offline: usize,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    pub writes: usize,
    pub write_failures: usize,
    pub read_failures: usize,
    pub duration_ms: u64,
}

impl CycleReport {
    fn new(cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            outcome: CycleOutcome::Completed,
            fetched: 0,
            monitored: 0,
            online: 0,
            offline: 0,
            alerts_sent: 0,
            alerts_failed: 0,
            writes: 0,
            write_failures: 0,
            read_failures: 0,
            duration_ms: 0,
        }
    }

    fn absorb(&mut self, device: DeviceOutcome) {
        if device.online {
            self.online += 1;
        } else {
            self.offline += 1;
        }
        match device.alert_delivered {
            Some(true) => self.alerts_sent += 1,
            Some(false) => self.alerts_failed += 1,
            None => {}
        }
        match device.written {
            Some(true) => self.writes += 1,
            Some(false) => self.write_failures += 1,
            None => {}
        }
        if device.read_failed {
            self.read_failures += 1;
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == CycleOutcome::Completed
    }
}

#[derive(Debug, Default)]
struct DeviceOutcome {
    online: bool,
    alert_delivered: Option<bool>,
    written: Option<bool>,
    read_failed: bool,
}

/// Runs reconciliation cycles against one source, notifier and store
#[derive(Debug)]
pub struct Monitor {
    source: Arc<dyn DeviceSource>,
    notifier: Arc<dyn Notifier>,
    store: StatusStore,
    settings: MonitorSettings,
    metrics: Option<Arc<MonitorMetrics>>,
}

impl Monitor {
    pub fn new(
        source: Arc<dyn DeviceSource>,
        notifier: Arc<dyn Notifier>,
        store: StatusStore,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            source,
            notifier,
            store,
            settings,
            metrics: None,
        }
    }

    /// Wire the Tailscale client and Telegram notifier from configuration.
    /// Status records and the token cache share `kv`.
    pub fn from_config(config: &MonitorConfig, kv: Arc<dyn KvStore>) -> Self {
        let http = reqwest::Client::new();
        let tokens = TokenCache::from_config(config, Arc::clone(&kv), http.clone());
        let source = TailscaleClient::from_config(config, tokens, http.clone());
        let notifier = TelegramNotifier::from_config(config, http);

        Self::new(
            Arc::new(source),
            Arc::new(notifier),
            StatusStore::new(kv),
            MonitorSettings::from(config),
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<MonitorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run one cycle as of `now`
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", %cycle_id);
        self.cycle(cycle_id, now).instrument(span).await
    }

    async fn cycle(&self, cycle_id: Uuid, now: DateTime<Utc>) -> CycleReport {
        let start = Instant::now();
        let _timer = self.metrics.as_ref().map(|m| m.start_cycle());
        let mut report = CycleReport::new(cycle_id);

        let devices = match self.source.devices().await {
            Ok(devices) => devices,
            Err(e) => {
                let error = e.to_string();
                tracing::error!(error = %error, "Failed to fetch device list");

                let delivery = self.notifier.send(&format_source_failure(&error)).await;
                self.record_alert("source_failure", delivery.delivered);
                if delivery.delivered {
                    report.alerts_sent += 1;
                } else {
                    report.alerts_failed += 1;
                    tracing::warn!(
                        notifier = self.notifier.id(),
                        error = delivery.error.as_deref().unwrap_or_default(),
                        "Failed to deliver source failure alert"
                    );
                }

                report.outcome = CycleOutcome::SourceFailed { error };
                return self.finish(report, start);
            }
        };
        report.fetched = devices.len();

        let devices = dedup(self.settings.tag_filter.apply(devices));
        report.monitored = devices.len();
        tracing::debug!(
            fetched = report.fetched,
            monitored = report.monitored,
            filter = %self.settings.tag_filter,
            "Reconciling devices"
        );

        let now_ms = now.timestamp_millis();
        if self.settings.parallel {
            let outcomes = futures::future::join_all(
                devices
                    .into_iter()
                    .map(|device| self.process_device(device, now, now_ms)),
            )
            .await;
            outcomes.into_iter().for_each(|o| report.absorb(o));
        } else {
            for device in devices {
                let outcome = self.process_device(device, now, now_ms).await;
                report.absorb(outcome);
            }
        }

        self.finish(report, start)
    }

    async fn process_device(&self, device: Device, now: DateTime<Utc>, now_ms: i64) -> DeviceOutcome {
        let observation =
            DeviceObservation::observe(device, now, self.settings.offline_threshold_minutes);
        let key = observation.key();
        let mut outcome = DeviceOutcome {
            online: observation.online,
            ..DeviceOutcome::default()
        };

        let prior = match self.store.get(&key).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Status read failed, treating device as unseen");
                self.record_store_error("read");
                outcome.read_failed = true;
                NodeStatus::Unknown
            }
        };

        let decision = reconcile(
            &observation,
            prior,
            now_ms,
            self.settings.reminder_interval_minutes,
        );

        if let Some(intent) = decision.alert {
            let text = format_alert(&observation.device, &intent);
            let delivery = self.notifier.send(&text).await;
            self.record_alert(intent.kind(), delivery.delivered);
            outcome.alert_delivered = Some(delivery.delivered);

            if delivery.delivered {
                tracing::info!(key = %key, kind = intent.kind(), "Alert sent");
            } else {
                tracing::warn!(
                    key = %key,
                    kind = intent.kind(),
                    notifier = self.notifier.id(),
                    error = delivery.error.as_deref().unwrap_or_default(),
                    "Alert delivery failed"
                );
            }
        }

        if decision.persist {
            match self.store.put(&key, &decision.record).await {
                Ok(()) => outcome.written = Some(true),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Status write failed");
                    self.record_store_error("write");
                    outcome.written = Some(false);
                }
            }
        }

        outcome
    }

    fn finish(&self, mut report: CycleReport, start: Instant) -> CycleReport {
        report.duration_ms = start.elapsed().as_millis() as u64;

        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(report.outcome.as_str());
            if report.is_completed() {
                metrics.set_devices(report.online, report.offline);
            }
        }

        tracing::info!(
            outcome = report.outcome.as_str(),
            fetched = report.fetched,
            monitored = report.monitored,
            online = report.online,
            offline = report.offline,
            alerts_sent = report.alerts_sent,
            alerts_failed = report.alerts_failed,
            writes = report.writes,
            write_failures = report.write_failures,
            read_failures = report.read_failures,
            duration_ms = report.duration_ms,
            "Cycle finished"
        );
        report
    }

    fn record_alert(&self, kind: &str, delivered: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_alert(kind, delivered);
        }
    }

    fn record_store_error(&self, op: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_store_error(op);
        }
    }
}

/// Keep the first device per store key so no key is processed twice
fn dedup(devices: Vec<Device>) -> Vec<Device> {
    let mut seen = HashSet::with_capacity(devices.len());
    devices
        .into_iter()
        .filter(|device| {
            let fresh = seen.insert(device.key());
            if !fresh {
                tracing::warn!(key = %device.key(), "Duplicate device in source response, skipping");
            }
            fresh
        })
        .collect()
}
