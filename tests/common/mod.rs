//! Shared test fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use blogkv::backup::{BackupEndpoint, BackupService};
use blogkv::{
    BackupPlan, Config, Error, ExportBatch, ImportReport, KvStore, MemoryStore, QuotaStore,
    Result,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Memory store whose `put`s fail on demand for chosen keys
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    failures: Mutex<HashMap<String, usize>>,
    puts: Mutex<Vec<String>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` writes of `key`
    pub fn fail_puts(&self, key: &str, times: usize) {
        self.failures.lock().insert(key.to_string(), times);
    }

    pub fn always_fail(&self, key: &str) {
        self.fail_puts(key, usize::MAX);
    }

    pub fn heal(&self) {
        self.failures.lock().clear();
    }

    /// Every attempted write, in order
    pub fn put_log(&self) -> Vec<String> {
        self.puts.lock().clone()
    }

    pub fn put_count(&self, key: &str) -> usize {
        self.puts.lock().iter().filter(|k| *k == key).count()
    }
}

#[async_trait]
impl KvStore for FaultyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.puts.lock().push(key.to_string());
        {
            let mut failures = self.failures.lock();
            if let Some(remaining) = failures.get_mut(key) {
                if *remaining > 0 {
                    *remaining = remaining.saturating_sub(1);
                    return Err(Error::Store(format!("injected failure writing {}", key)));
                }
            }
        }
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }
}

/// Backup endpoint that gives every call its own store call budget,
/// the way a host meters each inbound request
pub struct MeteredEndpoint<S> {
    pub store: Arc<S>,
    pub config: Config,
    pub quota: usize,
}

impl<S: KvStore> MeteredEndpoint<S> {
    pub fn new(store: Arc<S>, config: Config, quota: usize) -> Self {
        MeteredEndpoint {
            store,
            config,
            quota,
        }
    }

    fn request(&self) -> BackupService<QuotaStore<Arc<S>>> {
        BackupService::new(
            QuotaStore::new(self.store.clone(), self.quota),
            self.config.clone(),
        )
        .unwrap()
    }
}

#[async_trait]
impl<S: KvStore + 'static> BackupEndpoint for MeteredEndpoint<S> {
    async fn enumerate(&self) -> Result<BackupPlan> {
        self.request().enumerate_keys().await
    }

    async fn export(&self, keys: &[String]) -> Result<ExportBatch> {
        self.request().export_batch(keys).await
    }

    async fn import(&self, entries: &BTreeMap<String, String>) -> Result<ImportReport> {
        self.request().import_batch(entries).await
    }
}

/// Deterministic non-trivial bytes
pub fn sample_bytes(len: usize) -> Vec<u8> {
    let mut x: u32 = 0x9e37_79b9;
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            (x & 0xff) as u8
        })
        .collect()
}

/// Every indexed blob has metadata and data; every metadata key is indexed
pub fn assert_index_consistent(store: &MemoryStore) {
    let snapshot = store.snapshot();
    let index: Vec<serde_json::Value> = snapshot
        .get("images:index")
        .map(|raw| serde_json::from_str(raw).unwrap())
        .unwrap_or_default();
    let indexed: Vec<String> = index
        .iter()
        .map(|d| d["filename"].as_str().unwrap().to_string())
        .collect();

    for filename in &indexed {
        assert!(
            snapshot.contains_key(&format!("image_meta:{}", filename)),
            "{} indexed without metadata",
            filename
        );
        assert!(
            snapshot.contains_key(&format!("image:{}", filename)),
            "{} indexed without data",
            filename
        );
    }
    for key in snapshot.keys() {
        if let Some(filename) = key.strip_prefix("image_meta:") {
            assert!(
                indexed.iter().any(|f| f == filename),
                "{} has metadata but no index entry",
                filename
            );
        }
    }
    let mut unique = indexed.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), indexed.len(), "duplicate index entries");
}
