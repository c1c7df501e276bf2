//! Data model for blobs and the records that reference them

mod blob;
mod record;

pub use blob::{
    BlobData, BlobDescriptor, BlobLayout, BlobMeta, BlobUsage, StoredBlob, Upload, UploadReceipt,
};
pub use record::{NavLink, Post, PostSummary};
