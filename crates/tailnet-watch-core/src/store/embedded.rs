//! Durable key-value store backed by `sled`

use std::fmt;
use std::path::Path;

use super::{KvStore, StoreError, StoreResult};

/// [`KvStore`] persisted in an embedded `sled` database
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Database removed when the last handle is dropped
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

impl fmt::Debug for SledStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledStore")
            .field("entries", &self.db.len())
            .finish()
    }
}

fn utf8(key: &str, bytes: &[u8]) -> StoreResult<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait::async_trait]
impl KvStore for SledStore {
    fn name(&self) -> &str {
        "sled"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.db.get(key.as_bytes())? {
            Some(value) => utf8(key, &value).map(Some),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: String) -> StoreResult<()> {
        self.db.insert(key.as_bytes(), value.into_bytes())?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<(String, String)>> {
        let mut entries = Vec::new();
        for item in self.db.scan_prefix(prefix.as_bytes()) {
            let (key, value) = item?;
            let key = utf8(prefix, &key)?;
            let value = utf8(&key, &value)?;
            entries.push((key, value));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::NodeKey;
    use crate::status::NodeStatus;
    use crate::store::StatusStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.sled");
        let key = NodeKey::new("n1", "nas");
        let status = NodeStatus::Offline {
            first_down_at: 1000,
            last_alert_at: 2000,
        };

        {
            let store = StatusStore::new(Arc::new(SledStore::open(&path).unwrap()));
            store.put(&key, &status).await.unwrap();
        }

        let store = StatusStore::new(Arc::new(SledStore::open(&path).unwrap()));
        assert_eq!(store.get(&key).await.unwrap(), status);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_writes_are_durable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.sled");

        {
            let store = Arc::new(SledStore::open(&path).unwrap());
            let writes: Vec<_> = (0..16)
                .map(|i| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move {
                        store.put(&format!("node:n{}:host", i), "{}".to_string()).await
                    })
                })
                .collect();
            for write in writes {
                write.await.unwrap().unwrap();
            }
        }

        let store = SledStore::open(&path).unwrap();
        assert_eq!(store.list("node:").await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = SledStore::temporary().unwrap();
        store.put("node:a:x", "1".to_string()).await.unwrap();
        store.put("token", "2".to_string()).await.unwrap();

        let listed = store.list("node:").await.unwrap();
        assert_eq!(listed, vec![("node:a:x".to_string(), "1".to_string())]);
    }
}
