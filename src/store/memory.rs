//! In-memory store

use super::KvStore;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// A store that keeps values in memory
///
/// Data is lost when the store is dropped. An optional per-value size ceiling
/// mimics hosted namespaces that reject large values.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
    value_limit: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject `put`s of values longer than `limit` bytes
    pub fn with_value_limit(limit: usize) -> Self {
        MemoryStore {
            values: RwLock::new(HashMap::new()),
            value_limit: Some(limit),
        }
    }

    /// Number of keys stored
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    /// Copy of every entry, sorted by key
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        if let Some(limit) = self.value_limit {
            if value.len() > limit {
                return Err(Error::Store(format!(
                    "value for {} is {} bytes, limit is {}",
                    key,
                    value.len(),
                    limit
                )));
            }
        }
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        store.put("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_absent_is_ok() {
        let store = MemoryStore::new();
        store.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_value_limit() {
        let store = MemoryStore::with_value_limit(4);
        store.put("a", "1234").await.unwrap();
        assert!(matches!(store.put("b", "12345").await, Err(Error::Store(_))));
        assert!(!store.contains("b"));
    }
}
