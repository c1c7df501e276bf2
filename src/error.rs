//! Error types for blogkv

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for blogkv operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single key that could not be written, with the reason
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyError {
    pub key: String,
    pub error: String,
}

impl KeyError {
    pub fn new(key: impl Into<String>, error: impl ToString) -> Self {
        KeyError {
            key: key.into(),
            error: error.to_string(),
        }
    }
}

/// Errors that can occur in blogkv operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt blob: {0}")]
    CorruptBlob(String),

    #[error("Upload too large: {size} bytes exceeds limit of {limit} bytes")]
    Oversize { size: u64, limit: u64 },

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("{} key(s) failed to write", failed.len())]
    PartialWriteFailure { failed: Vec<KeyError> },

    #[error("Store call quota of {limit} exceeded")]
    QuotaExceeded { limit: usize },

    #[error("Batch of {size} keys exceeds limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("Store error: {0}")]
    Store(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error is the caller's fault (a 4xx in HTTP terms)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::Oversize { .. }
                | Error::UnsupportedType(_)
                | Error::BatchTooLarge { .. }
        )
    }

    /// Keys named by a partial write, empty for every other error
    pub fn failed_keys(&self) -> Vec<&str> {
        match self {
            Error::PartialWriteFailure { failed } => {
                failed.iter().map(|f| f.key.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}
