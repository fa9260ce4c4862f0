//! Tailnet Watch Core
//!
//! Device liveness classification and status reconciliation for the
//! Tailnet Watch agent.
//!
//! ## Architecture
//!
//! 1. **Devices** (`device`): devices decoded from the liveness source, the
//!    per-cycle observations derived from them, and their store keys.
//!
//! 2. **Classifier** (`classify`): pure online/offline verdict from a
//!    last-contact timestamp and an offline threshold.
//!
//! 3. **Status** (`status`): the persisted per-device record, modeled as a sum
//!    type, and its JSON wire form.
//!
//! 4. **Reconciliation** (`reconcile`): the transition decision procedure that
//!    turns an observation and a prior record into an alert intent and the
//!    record to persist.
//!
//! 5. **Fleet filter** (`filter`): tag-based selection of monitored devices.
//!
//! 6. **Store** (`store`): the key-value capability trait, an in-memory and an
//!    embedded (`sled`) implementation, and the typed status adapter.
//!
//! ## Example
//!
//! ```rust
//! use tailnet_watch_core::{reconcile, Device, DeviceObservation, NodeStatus};
//! use chrono::{Duration, Utc};
//!
//! let now = Utc::now();
//! let device = Device::new("n1", "nas.tail1234.ts.net", vec![], now - Duration::minutes(30));
//! let observation = DeviceObservation::observe(device, now, 5);
//!
//! let outcome = reconcile(&observation, NodeStatus::Online, now.timestamp_millis(), 240);
//! assert!(outcome.alert.is_some());
//! assert!(outcome.persist);
//! ```

pub mod classify;
pub mod device;
pub mod filter;
pub mod reconcile;
pub mod status;
pub mod store;

pub use classify::{classify, Liveness};
pub use device::{short_name_of, Device, DeviceObservation, NodeKey};
pub use filter::TagFilter;
pub use reconcile::{reconcile, AlertIntent, Reconciliation};
pub use status::{timestamp_display, NodeState, NodeStatus, StoredStatus};
pub use store::{
    KvStore, MemoryStore, SledStore, StatusEntry, StatusStore, StoreError, StoreResult,
    NODE_KEY_PREFIX,
};

/// Milliseconds in one minute
pub const MS_PER_MINUTE: i64 = 60_000;
