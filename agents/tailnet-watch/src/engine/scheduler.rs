//! Fixed-interval cycle scheduler for `serve` mode

use chrono::Utc;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tailnet_watch_core::KvStore;
use tokio::time::MissedTickBehavior;

use super::Monitor;
use crate::config::MonitorConfig;
use crate::telemetry::MonitorMetrics;

/// Run a cycle every `interval` until `shutdown` resolves.
///
/// Configuration is reloaded and validated at every tick; a tick with
/// invalid configuration is skipped. The store is opened once by the caller
/// and shared by every cycle.
pub async fn run_scheduled<F>(
    config_path: Option<PathBuf>,
    interval: Duration,
    kv: Arc<dyn KvStore>,
    metrics: Arc<MonitorMetrics>,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    tracing::info!(interval_secs = interval.as_secs(), store = kv.name(), "Scheduler started");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Scheduler stopping");
                break;
            }
            _ = ticker.tick() => {
                let config = match MonitorConfig::load(config_path.as_deref()) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::error!(error = %e, "Invalid configuration, skipping cycle");
                        metrics.record_cycle("config_error");
                        continue;
                    }
                };

                let monitor = Monitor::from_config(&config, Arc::clone(&kv))
                    .with_metrics(Arc::clone(&metrics));
                monitor.run_cycle(Utc::now()).await;
            }
        }
    }
}
