//! # blogkv
//!
//! Blob storage and full-store backup for a blog whose only persistence is a
//! hosted key-value namespace.
//!
//! The namespace has two limits that shape everything here: a single value
//! is small (well under a typical image or 3-D model), and a single inbound
//! request may only make a handful of store calls.
//!
//! ## Core Concepts
//!
//! - **Blobs**: raw files stored as base64 text, split into ordered chunks
//!   when the text exceeds the chunk threshold
//! - **Index**: `images:index`, the newest-first directory of all blobs
//! - **Backup plan**: the keys of a full backup, enumerated without reading
//!   every blob
//! - **Batches**: export and import move a few keys per request and report
//!   exactly which keys failed, so the caller can retry just those
//!
//! ## Example
//!
//! ```ignore
//! use blogkv::{BlobStore, Config, MemoryStore, Upload};
//!
//! let blobs = BlobStore::new(MemoryStore::new(), Config::default())?;
//! let receipt = blobs.upload(Upload::new(png_bytes, "image/png", "cat.png")).await?;
//! let bytes = blobs.get(&receipt.filename).await?;
//! ```

pub mod backup;
pub mod blob;
pub mod codec;
pub mod config;
pub mod keys;
pub mod model;
pub mod planner;
pub mod store;

mod error;

pub use backup::{
    BackupArchive, BackupClient, BackupEndpoint, BackupPlan, BackupService, ExportBatch,
    ImportReport, RestoreSummary,
};
pub use blob::{BlobStore, UploadPolicy};
pub use config::Config;
pub use error::{Error, KeyError, Result};
pub use keys::KeyKind;
pub use model::{BlobData, BlobDescriptor, BlobMeta, BlobUsage, StoredBlob, Upload, UploadReceipt};
pub use planner::ChunkPlan;
pub use store::{FileStore, KvStore, MemoryStore, QuotaStore};

#[cfg(feature = "http-store")]
pub use store::HttpStore;
