//! Upload acceptance rules and storage filenames

use crate::config::{Config, DEFAULT_MAX_UPLOAD_SIZE};
use crate::model::Upload;
use crate::{Error, Result};
use rand::Rng;

/// Extensions accepted for upload: images and glTF models
pub const ALLOWED_EXTENSIONS: [&str; 10] = [
    "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "bmp", "glb", "gltf",
];

/// Which uploads are accepted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPolicy {
    pub allowed_extensions: Vec<String>,
    pub max_size: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        UploadPolicy {
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            max_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

impl UploadPolicy {
    pub fn from_config(config: &Config) -> Self {
        UploadPolicy {
            max_size: config.max_upload_size,
            ..Default::default()
        }
    }

    /// Validate an upload and return its normalized extension
    ///
    /// Both the declared size and the real length must be within the limit.
    pub fn check(&self, upload: &Upload) -> Result<String> {
        let ext = extension_of(&upload.original_name)
            .ok_or_else(|| Error::UnsupportedType(upload.original_name.clone()))?;
        if !self.allowed_extensions.iter().any(|a| *a == ext) {
            return Err(Error::UnsupportedType(ext));
        }

        let size = upload.declared_size.max(upload.bytes.len() as u64);
        if size > self.max_size {
            return Err(Error::Oversize {
                size,
                limit: self.max_size,
            });
        }
        Ok(ext)
    }
}

/// Lowercased extension after the last dot
pub fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Fresh storage filename: `<unix millis>-<6 base36 chars>.<ext>`
pub fn generate_filename(ext: &str) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect();
    format!("{}-{}.{}", chrono::Utc::now().timestamp_millis(), suffix, ext)
}
