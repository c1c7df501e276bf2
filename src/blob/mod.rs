//! Chunked blob storage
//!
//! [`BlobStore`] is the only writer of the `image:*` and `image_meta:*` key
//! families and of `images:index`.

mod policy;
mod store;
mod usage;

pub use policy::{extension_of, generate_filename, UploadPolicy, ALLOWED_EXTENSIONS};
pub use store::BlobStore;
pub use usage::{upload_urls, UsageSet};
