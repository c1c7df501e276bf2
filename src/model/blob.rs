//! Blob descriptors, metadata, and primary-value layout

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One entry of the blob index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobDescriptor {
    pub filename: String,
    #[serde(default)]
    pub content_type: String,
    /// Raw size in bytes
    #[serde(rename = "size", alias = "sizeBytes", default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub original_name: String,
    /// Upload time (unix millis)
    #[serde(default)]
    pub created_at: i64,
}

/// Per-blob metadata stored under `image_meta:<filename>`
///
/// Written once at upload time and never modified. Records written before
/// chunking existed carry neither `chunked` nor `totalChunks`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMeta {
    #[serde(default)]
    pub content_type: String,
    #[serde(rename = "size", alias = "sizeBytes", default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub original_name: String,
    #[serde(default)]
    pub chunked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,
}

impl BlobMeta {
    /// Chunk count this metadata promises; zero for inline blobs
    pub fn chunk_count(&self) -> u32 {
        if self.chunked {
            self.total_chunks.unwrap_or(0)
        } else {
            0
        }
    }

    /// The primary-value layout this metadata describes
    pub fn layout(&self) -> BlobLayout {
        if self.chunked {
            BlobLayout::Chunked {
                total_chunks: self.chunk_count(),
            }
        } else {
            BlobLayout::Inline
        }
    }
}

/// Shape of a blob's data, as promised by its metadata
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobLayout {
    Inline,
    Chunked { total_chunks: u32 },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkedMarker {
    chunked: bool,
    total_chunks: u32,
}

/// Value stored under the primary key `image:<filename>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlobData {
    /// The whole encoded payload
    Inline(String),
    /// Placeholder pointing at `total_chunks` chunk keys
    Chunked { total_chunks: u32 },
}

impl BlobData {
    /// Interpret a primary value
    ///
    /// Base64 text never starts with `{`, so anything that parses as a
    /// chunked marker is one.
    pub fn parse(raw: String) -> Self {
        if raw.starts_with('{') {
            if let Ok(marker) = serde_json::from_str::<ChunkedMarker>(&raw) {
                if marker.chunked {
                    return BlobData::Chunked {
                        total_chunks: marker.total_chunks,
                    };
                }
            }
        }
        BlobData::Inline(raw)
    }

    /// The primary value to store
    pub fn render(&self) -> crate::Result<String> {
        match self {
            BlobData::Inline(text) => Ok(text.clone()),
            BlobData::Chunked { total_chunks } => Ok(serde_json::to_string(&ChunkedMarker {
                chunked: true,
                total_chunks: *total_chunks,
            })?),
        }
    }
}

/// A file handed over by the upload transport
#[derive(Clone, Debug)]
pub struct Upload {
    pub bytes: Bytes,
    pub content_type: String,
    pub original_name: String,
    /// Size claimed by the client; checked along with the real length
    pub declared_size: u64,
}

impl Upload {
    pub fn new(
        bytes: impl Into<Bytes>,
        content_type: impl Into<String>,
        original_name: impl Into<String>,
    ) -> Self {
        let bytes = bytes.into();
        Upload {
            declared_size: bytes.len() as u64,
            bytes,
            content_type: content_type.into(),
            original_name: original_name.into(),
        }
    }
}

/// Where an accepted upload can be fetched from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub url: String,
    pub filename: String,
}

/// A blob read back from the store
#[derive(Clone, Debug)]
pub struct StoredBlob {
    pub meta: BlobMeta,
    pub bytes: Bytes,
}

/// Index entry annotated with whether any record references it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobUsage {
    #[serde(flatten)]
    pub descriptor: BlobDescriptor,
    pub url: String,
    pub used: bool,
}
