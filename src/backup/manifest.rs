//! Backup documents exchanged with the client

use crate::{Error, KeyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format version of [`BackupArchive`]
pub const BACKUP_VERSION: u32 = 2;

/// Keys that make up a full backup, from [`enumerate_keys`]
///
/// Chunk keys are not listed: they are discovered while exporting, from the
/// metadata entries, and returned as `extraKeys`.
///
/// [`enumerate_keys`]: crate::backup::BackupService::enumerate_keys
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPlan {
    pub version: u32,
    /// RFC 3339 timestamp
    pub created_at: String,
    pub keys: Vec<String>,
    pub needs_chunk_scan: bool,
}

/// Values read by one export request
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBatch {
    pub data: BTreeMap<String, String>,
    /// Chunk keys found while reading, to be requested in a later batch
    pub extra_keys: Vec<String>,
    /// Requested keys that do not exist
    #[serde(default)]
    pub missing: Vec<String>,
}

/// Outcome of one import request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success: bool,
    pub restored_keys: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<KeyError>,
}

impl ImportReport {
    pub fn new(restored_keys: usize, errors: Vec<KeyError>) -> Self {
        ImportReport {
            success: errors.is_empty(),
            restored_keys,
            errors,
        }
    }

    /// `Err(PartialWriteFailure)` naming the failed keys unless every write succeeded
    pub fn into_result(self) -> Result<usize> {
        if self.success {
            Ok(self.restored_keys)
        } else {
            Err(Error::PartialWriteFailure {
                failed: self.errors,
            })
        }
    }
}

/// A complete backup: every key and its raw value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupArchive {
    pub version: u32,
    pub created_at: String,
    pub data: BTreeMap<String, String>,
}

impl BackupArchive {
    pub fn check_version(&self) -> Result<()> {
        if self.version == 0 || self.version > BACKUP_VERSION {
            return Err(Error::Config(format!(
                "unsupported backup version {} (newest supported is {})",
                self.version, BACKUP_VERSION
            )));
        }
        Ok(())
    }
}

/// Outcome of a full restore
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    pub restored_keys: usize,
    /// Rounds needed, 1 when nothing had to be retried
    pub attempts: usize,
}
