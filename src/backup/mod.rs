//! Full-store backup under a per-request call budget
//!
//! - [`BackupService::enumerate_keys`] lists the keys of a full backup
//! - [`BackupService::export_batch`] reads a handful of keys and reports
//!   chunk keys discovered along the way
//! - [`BackupService::import_batch`] writes a handful of keys and reports
//!   per-key failures
//! - [`BackupClient`] strings those calls together into a full export or
//!   restore, retrying only what failed

mod client;
mod enumerate;
mod manifest;
mod transfer;

pub use client::{BackupClient, BackupEndpoint};
pub use enumerate::enumerate_keys;
pub use manifest::{
    BackupArchive, BackupPlan, ExportBatch, ImportReport, RestoreSummary, BACKUP_VERSION,
};
pub use transfer::BackupService;
