//! In-memory key-value store

use std::collections::HashMap;
use std::sync::RwLock;

use super::{KvStore, StoreError, StoreResult};

/// Process-local [`KvStore`]; contents are lost on exit
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".to_string())
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<(String, String)>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_list() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.put("node:a:x", "1".to_string()).await.unwrap();
        store.put("node:b:y", "2".to_string()).await.unwrap();
        store.put("other", "3".to_string()).await.unwrap();
        store.put("node:a:x", "4".to_string()).await.unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.get("node:a:x").await.unwrap().as_deref(), Some("4"));
        assert_eq!(store.get("missing").await.unwrap(), None);

        let mut listed = store.list("node:").await.unwrap();
        listed.sort();
        assert_eq!(
            listed,
            vec![
                ("node:a:x".to_string(), "4".to_string()),
                ("node:b:y".to_string(), "2".to_string()),
            ]
        );
    }
}
