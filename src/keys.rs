//! Store key namespace
//!
//! Every key the crate reads or writes is built here, so writers and readers
//! derive the same names. The layout is fixed by data already in deployed
//! stores and must not change:
//!
//! ```text
//! image:<filename>                primary blob data or chunked marker
//! image:<filename>:chunk:<i>      i-th chunk, 0 <= i < totalChunks
//! image_meta:<filename>           blob metadata (JSON)
//! images:index                    blob descriptors, newest first
//! post:<id>  posts:index  categories  site:settings  nav:links
//! comments:<postId>  comments:index
//! ```

pub const SETTINGS: &str = "site:settings";
pub const POSTS_INDEX: &str = "posts:index";
pub const CATEGORIES: &str = "categories";
pub const IMAGES_INDEX: &str = "images:index";
pub const NAV_LINKS: &str = "nav:links";
pub const COMMENTS_INDEX: &str = "comments:index";

/// Singleton keys in backup order
pub const SINGLETONS: [&str; 6] = [
    SETTINGS,
    POSTS_INDEX,
    CATEGORIES,
    IMAGES_INDEX,
    NAV_LINKS,
    COMMENTS_INDEX,
];

const BLOB_PREFIX: &str = "image:";
const META_PREFIX: &str = "image_meta:";
const CHUNK_INFIX: &str = ":chunk:";
const POST_PREFIX: &str = "post:";
const COMMENTS_PREFIX: &str = "comments:";

/// Public URL prefix under which blobs are served
pub const UPLOAD_URL_PREFIX: &str = "/uploads/";

pub fn blob_key(filename: &str) -> String {
    format!("{BLOB_PREFIX}{filename}")
}

pub fn chunk_key(filename: &str, index: u32) -> String {
    format!("{}{CHUNK_INFIX}{index}", blob_key(filename))
}

pub fn meta_key(filename: &str) -> String {
    format!("{META_PREFIX}{filename}")
}

pub fn post_key(id: &str) -> String {
    format!("{POST_PREFIX}{id}")
}

pub fn comments_key(post_id: &str) -> String {
    format!("{COMMENTS_PREFIX}{post_id}")
}

pub fn upload_url(filename: &str) -> String {
    format!("{UPLOAD_URL_PREFIX}{filename}")
}

/// The family a store key belongs to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Singleton,
    Post { id: String },
    Comments { post_id: String },
    BlobData { filename: String },
    BlobChunk { filename: String, index: u32 },
    BlobMeta { filename: String },
    Unknown,
}

impl KeyKind {
    /// Parse a key back into its family
    pub fn classify(key: &str) -> KeyKind {
        if SINGLETONS.contains(&key) {
            return KeyKind::Singleton;
        }
        if let Some(filename) = key.strip_prefix(META_PREFIX) {
            return non_empty(filename, |f| KeyKind::BlobMeta { filename: f });
        }
        if let Some(rest) = key.strip_prefix(BLOB_PREFIX) {
            // Filenames never contain ':' so the last infix is the chunk marker
            if let Some((filename, index)) = rest.rsplit_once(CHUNK_INFIX) {
                if let Ok(index) = index.parse::<u32>() {
                    return non_empty(filename, |f| KeyKind::BlobChunk { filename: f, index });
                }
                return KeyKind::Unknown;
            }
            return non_empty(rest, |f| KeyKind::BlobData { filename: f });
        }
        if let Some(id) = key.strip_prefix(POST_PREFIX) {
            return non_empty(id, |id| KeyKind::Post { id });
        }
        if let Some(post_id) = key.strip_prefix(COMMENTS_PREFIX) {
            return non_empty(post_id, |post_id| KeyKind::Comments { post_id });
        }
        KeyKind::Unknown
    }

    /// Whether this key is part of the backup universe
    pub fn is_known(&self) -> bool {
        !matches!(self, KeyKind::Unknown)
    }
}

fn non_empty(s: &str, f: impl FnOnce(String) -> KeyKind) -> KeyKind {
    if s.is_empty() {
        KeyKind::Unknown
    } else {
        f(s.to_string())
    }
}
