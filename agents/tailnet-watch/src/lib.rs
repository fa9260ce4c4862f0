//! Tailnet Watch Agent
//!
//! Polls the Tailscale device API on a fixed interval, reconciles each
//! device's liveness against its persisted status, and sends Telegram alerts
//! when a device goes down, stays down past the reminder interval, or
//! recovers.
//!
//! # Modules
//! - `config`: environment/file configuration and validation
//! - `client`: Tailscale API client with a store-backed OAuth token cache
//! - `notifier`: Telegram delivery and alert message formatting
//! - `engine`: the reconciliation cycle and its scheduler
//! - `handler`: read-only HTTP status endpoint
//! - `telemetry`: Prometheus metrics
//!
//! # Failure model
//! - Fetch failures abort the cycle and raise one aggregate alert
//! - Store and delivery failures stay local to one device
//! - Overlapping cycles may duplicate an alert but never corrupt a record

pub mod client;
pub mod config;
pub mod engine;
pub mod handler;
pub mod notifier;
pub mod telemetry;

// Re-export contracts
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use contracts::*;
