//! Status storage
//!
//! [`KvStore`] is the raw key-value capability the agent needs (`get`, `put`,
//! `list`). Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: process-local map, for tests and dry runs
//! - [`SledStore`]: durable embedded store backed by `sled`
//!
//! [`StatusStore`] is the typed adapter used by the reconciliation path. It
//! maps [`NodeKey`]s to JSON-encoded [`NodeStatus`] values. The same
//! [`KvStore`] also holds other agent state (the cached API token) under keys
//! outside the `node:` prefix.

mod embedded;
mod memory;

pub use embedded::SledStore;
pub use memory::MemoryStore;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::device::NodeKey;
use crate::status::NodeStatus;

/// Prefix shared by every status record key
pub const NODE_KEY_PREFIX: &str = "node:";

/// Errors raised by store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend could not be reached or failed the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored value exists but cannot be decoded
    #[error("Corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Key does not follow the `node:<id>:<shortName>` layout
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Value could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Raw key-value capability.
///
/// Reads after writes are only required to be eventually consistent.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync + fmt::Debug {
    /// Backend name for logs
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn put(&self, key: &str, value: String) -> StoreResult<()>;

    /// All entries whose key starts with `prefix`, in no particular order
    async fn list(&self, prefix: &str) -> StoreResult<Vec<(String, String)>>;
}

/// One decoded status record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub key: NodeKey,
    pub status: NodeStatus,
}

/// Typed access to per-device status records
#[derive(Debug, Clone)]
pub struct StatusStore {
    kv: Arc<dyn KvStore>,
}

impl StatusStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Underlying key-value store
    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// Stored status, `None` when the device has no record yet
    pub async fn find(&self, key: &NodeKey) -> StoreResult<Option<NodeStatus>> {
        let raw_key = key.to_string();
        match self.kv.get(&raw_key).await? {
            Some(raw) => decode(&raw_key, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Stored status, [`NodeStatus::Unknown`] when the device has no record
    pub async fn get(&self, key: &NodeKey) -> StoreResult<NodeStatus> {
        Ok(self.find(key).await?.unwrap_or_default())
    }

    pub async fn put(&self, key: &NodeKey, status: &NodeStatus) -> StoreResult<()> {
        let value = serde_json::to_string(status)?;
        self.kv.put(&key.to_string(), value).await
    }

    /// Every decodable status record. Entries with foreign keys or corrupt
    /// values are skipped and logged.
    pub async fn snapshot(&self) -> StoreResult<Vec<StatusEntry>> {
        let raw = self.kv.list(NODE_KEY_PREFIX).await?;
        let mut entries = Vec::with_capacity(raw.len());

        for (raw_key, value) in raw {
            let key = match raw_key.parse::<NodeKey>() {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!(key = %raw_key, error = %e, "Skipping record with invalid key");
                    continue;
                }
            };
            match decode(&raw_key, &value) {
                Ok(status) => entries.push(StatusEntry { key, status }),
                Err(e) => {
                    tracing::warn!(key = %raw_key, error = %e, "Skipping corrupt status record");
                }
            }
        }

        Ok(entries)
    }
}

fn decode(key: &str, raw: &str) -> StoreResult<NodeStatus> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
