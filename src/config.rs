//! Runtime configuration
//!
//! Defaults match the limits of the hosted KV namespace the blog runs on.
//! Every field can be overridden from a `BLOGKV_*` environment variable.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Largest value the store accepts, in bytes
pub const DEFAULT_MAX_VALUE_SIZE: usize = 1_500_000;

/// Encoded characters per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 512 * 1024;

/// Largest accepted upload, in raw bytes
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-value size ceiling of the store
    pub max_value_size: usize,
    /// Chunk threshold in encoded characters; must stay below `max_value_size`
    pub chunk_size: usize,
    /// Upload ceiling in raw bytes
    pub max_upload_size: u64,
    /// Keys per export request
    pub export_batch_limit: usize,
    /// Keys per import request
    pub import_batch_limit: usize,
    /// How many times the backup client submits a failing key before giving up
    pub import_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            export_batch_limit: 6,
            import_batch_limit: 3,
            import_attempts: 3,
        }
    }
}

impl Config {
    /// Defaults overridden by `BLOGKV_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        env_override("BLOGKV_MAX_VALUE_SIZE", &mut config.max_value_size)?;
        env_override("BLOGKV_CHUNK_SIZE", &mut config.chunk_size)?;
        env_override("BLOGKV_MAX_UPLOAD_SIZE", &mut config.max_upload_size)?;
        env_override("BLOGKV_EXPORT_BATCH", &mut config.export_batch_limit)?;
        env_override("BLOGKV_IMPORT_BATCH", &mut config.import_batch_limit)?;
        env_override("BLOGKV_IMPORT_ATTEMPTS", &mut config.import_attempts)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the limits are usable together
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".into()));
        }
        if self.chunk_size >= self.max_value_size {
            return Err(Error::Config(format!(
                "chunk_size {} must be below max_value_size {}",
                self.chunk_size, self.max_value_size
            )));
        }
        if self.export_batch_limit == 0 || self.import_batch_limit == 0 {
            return Err(Error::Config("batch limits must be positive".into()));
        }
        if self.import_attempts == 0 {
            return Err(Error::Config("import_attempts must be positive".into()));
        }
        Ok(())
    }
}

fn env_override<T: std::str::FromStr>(name: &str, slot: &mut T) -> Result<()> {
    if let Ok(raw) = std::env::var(name) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} is not a valid number: {:?}", name, raw)))?;
    }
    Ok(())
}

/// Default location of the CLI's store file
///
/// `BLOGKV_STORE` wins, then `<data dir>/blogkv/store.json`.
pub fn default_store_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("BLOGKV_STORE") {
        return Ok(PathBuf::from(path));
    }
    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Config("Could not find data directory".into()))?
        .join("blogkv");
    Ok(data_dir.join("store.json"))
}
