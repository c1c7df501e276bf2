//! Client side of the backup protocol
//!
//! Turns a full export or restore into a sequence of small endpoint calls.
//! Each call is meant to be one request to the host, so the per-request
//! store budget only ever has to cover one batch.

use super::manifest::{
    BackupArchive, BackupPlan, ExportBatch, ImportReport, RestoreSummary, BACKUP_VERSION,
};
use super::transfer::BackupService;
use crate::config::Config;
use crate::keys::KeyKind;
use crate::store::KvStore;
use crate::{Error, KeyError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

/// The three backup calls a server exposes
#[async_trait]
pub trait BackupEndpoint: Send + Sync {
    async fn enumerate(&self) -> Result<BackupPlan>;

    async fn export(&self, keys: &[String]) -> Result<ExportBatch>;

    async fn import(&self, entries: &BTreeMap<String, String>) -> Result<ImportReport>;
}

#[async_trait]
impl<S: KvStore> BackupEndpoint for BackupService<S> {
    async fn enumerate(&self) -> Result<BackupPlan> {
        self.enumerate_keys().await
    }

    async fn export(&self, keys: &[String]) -> Result<ExportBatch> {
        self.export_batch(keys).await
    }

    async fn import(&self, entries: &BTreeMap<String, String>) -> Result<ImportReport> {
        self.import_batch(entries).await
    }
}

/// Drives full exports and restores against a [`BackupEndpoint`]
pub struct BackupClient<E> {
    endpoint: E,
    export_batch: usize,
    import_batch: usize,
    attempts: usize,
}

impl<E: BackupEndpoint> BackupClient<E> {
    pub fn new(endpoint: E, config: &Config) -> Self {
        BackupClient {
            endpoint,
            export_batch: config.export_batch_limit.max(1),
            import_batch: config.import_batch_limit.max(1),
            attempts: config.import_attempts.max(1),
        }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Export every key, following chunk keys breadth-first
    pub async fn export_all(&self) -> Result<BackupArchive> {
        let plan = self.endpoint.enumerate().await?;
        let mut seen: HashSet<String> = plan.keys.iter().cloned().collect();
        let mut queue: VecDeque<String> = plan.keys.into();
        let mut data = BTreeMap::new();
        let mut requests = 0usize;

        while !queue.is_empty() {
            let take = self.export_batch.min(queue.len());
            let batch: Vec<String> = queue.drain(..take).collect();
            let result = self.export_with_retry(&batch).await?;
            requests += 1;

            for key in result.extra_keys {
                if seen.insert(key.clone()) {
                    queue.push_back(key);
                }
            }
            data.extend(result.data);
        }

        info!(keys = data.len(), requests, "export complete");
        Ok(BackupArchive {
            version: BACKUP_VERSION,
            created_at: plan.created_at,
            data,
        })
    }

    async fn export_with_retry(&self, batch: &[String]) -> Result<ExportBatch> {
        let mut attempt = 1;
        loop {
            match self.endpoint.export(batch).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.attempts && !e.is_client_error() => {
                    warn!(attempt, error = %e, "export batch failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Write every key of an archive, resubmitting only failed keys
    ///
    /// Blob data and chunks go first and the index keys last, so a restore
    /// cut short never leaves an index pointing at data that was not written.
    pub async fn import_all(&self, archive: &BackupArchive) -> Result<RestoreSummary> {
        archive.check_version()?;

        let mut pending: Vec<(&String, &String)> = archive.data.iter().collect();
        pending.sort_by_key(|(key, _)| restore_rank(key));

        let mut restored = 0usize;
        let mut attempt = 0usize;
        let mut failed: Vec<KeyError> = Vec::new();
        while !pending.is_empty() && attempt < self.attempts {
            attempt += 1;
            failed.clear();

            for batch in pending.chunks(self.import_batch) {
                let entries: BTreeMap<String, String> = batch
                    .iter()
                    .map(|(k, v)| ((*k).clone(), (*v).clone()))
                    .collect();
                match self.endpoint.import(&entries).await {
                    Ok(report) => {
                        restored += report.restored_keys;
                        failed.extend(report.errors);
                    }
                    Err(e) if e.is_client_error() => return Err(e),
                    Err(e) => {
                        warn!(attempt, error = %e, "import batch failed");
                        failed.extend(entries.keys().map(|k| KeyError::new(k.as_str(), &e)));
                    }
                }
            }

            let retry: HashSet<&str> = failed.iter().map(|f| f.key.as_str()).collect();
            pending.retain(|(key, _)| retry.contains(key.as_str()));
            debug!(attempt, remaining = pending.len(), "import round finished");
        }

        if !failed.is_empty() {
            return Err(Error::PartialWriteFailure { failed });
        }
        info!(restored, attempts = attempt, "restore complete");
        Ok(RestoreSummary {
            restored_keys: restored,
            attempts: attempt,
        })
    }
}

/// Write order during restore: payload before metadata before records before indexes
fn restore_rank(key: &str) -> u8 {
    match KeyKind::classify(key) {
        KeyKind::BlobChunk { .. } => 0,
        KeyKind::BlobData { .. } => 1,
        KeyKind::BlobMeta { .. } => 2,
        KeyKind::Post { .. } | KeyKind::Comments { .. } => 3,
        KeyKind::Singleton => 4,
        KeyKind::Unknown => 5,
    }
}
