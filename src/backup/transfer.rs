//! Paged export and import
//!
//! Each call handles one small batch so it fits inside a single request's
//! store call budget. Nothing spans requests: the client drives the
//! traversal and retries, and every per-key operation is idempotent.

use super::enumerate::enumerate_keys;
use super::manifest::{BackupPlan, ExportBatch, ImportReport};
use crate::config::Config;
use crate::keys::{self, KeyKind};
use crate::model::{BlobData, BlobMeta};
use crate::store::{put_many, KvStore};
use crate::{Error, KeyError, Result};
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Server side of the backup protocol
pub struct BackupService<S> {
    store: S,
    config: Config,
}

impl<S: KvStore> BackupService<S> {
    pub fn new(store: S, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(BackupService { store, config })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Keys of a full backup; see [`enumerate_keys`]
    pub async fn enumerate_keys(&self) -> Result<BackupPlan> {
        enumerate_keys(&self.store).await
    }

    /// Read a batch of keys
    ///
    /// For every blob metadata value read (and every chunked marker), the
    /// blob's chunk keys are returned in `extra_keys` so the client can fetch
    /// them in later batches.
    pub async fn export_batch(&self, batch: &[String]) -> Result<ExportBatch> {
        check_batch(batch.len(), self.config.export_batch_limit)?;

        let values = join_all(batch.iter().map(|k| self.store.get(k))).await;

        let mut out = ExportBatch::default();
        for (key, value) in batch.iter().zip(values) {
            let Some(value) = value? else {
                out.missing.push(key.clone());
                continue;
            };
            for extra in discovered_chunks(key, &value) {
                if !out.extra_keys.contains(&extra) {
                    out.extra_keys.push(extra);
                }
            }
            out.data.insert(key.clone(), value);
        }

        debug!(
            requested = batch.len(),
            read = out.data.len(),
            extra = out.extra_keys.len(),
            "exported batch"
        );
        Ok(out)
    }

    /// Write a batch of key/value pairs
    ///
    /// Every entry is attempted independently. Keys outside the blog's
    /// namespace and values the store would reject for size are refused
    /// without a store call. The report lists each failed key.
    pub async fn import_batch(&self, batch: &BTreeMap<String, String>) -> Result<ImportReport> {
        check_batch(batch.len(), self.config.import_batch_limit)?;

        let mut errors = Vec::new();
        let mut writes = Vec::with_capacity(batch.len());
        for (key, value) in batch {
            if !KeyKind::classify(key).is_known() {
                errors.push(KeyError::new(key.as_str(), "unrecognized key"));
            } else if value.len() > self.config.max_value_size {
                errors.push(KeyError::new(
                    key.as_str(),
                    format!(
                        "value is {} bytes, store limit is {}",
                        value.len(),
                        self.config.max_value_size
                    ),
                ));
            } else {
                writes.push((key.as_str(), value.as_str()));
            }
        }

        let failed = put_many(&self.store, &writes).await;
        let restored = writes.len() - failed.len();
        errors.extend(failed);

        for e in &errors {
            warn!(key = e.key.as_str(), error = e.error.as_str(), "import failed");
        }
        info!(restored, failed = errors.len(), "imported batch");
        Ok(ImportReport::new(restored, errors))
    }
}

fn check_batch(size: usize, limit: usize) -> Result<()> {
    if size > limit {
        return Err(Error::BatchTooLarge { size, limit });
    }
    Ok(())
}

/// Chunk keys implied by an exported value
fn discovered_chunks(key: &str, value: &str) -> Vec<String> {
    let (filename, count) = match KeyKind::classify(key) {
        KeyKind::BlobMeta { filename } => match serde_json::from_str::<BlobMeta>(value) {
            Ok(meta) => (filename, meta.chunk_count()),
            Err(e) => {
                warn!(key, error = %e, "unreadable metadata in export");
                return Vec::new();
            }
        },
        // Covers blobs whose metadata is gone; duplicates are dropped by the caller
        KeyKind::BlobData { filename } if value.starts_with('{') => {
            match BlobData::parse(value.to_string()) {
                BlobData::Chunked { total_chunks } => (filename, total_chunks),
                BlobData::Inline(_) => return Vec::new(),
            }
        }
        _ => return Vec::new(),
    };
    (0..count).map(|i| keys::chunk_key(&filename, i)).collect()
}
