//! Enumerating the keys of a full backup

use super::manifest::{BackupPlan, BACKUP_VERSION};
use crate::keys::{self, IMAGES_INDEX, POSTS_INDEX, SINGLETONS};
use crate::model::{BlobDescriptor, PostSummary};
use crate::store::{get_json, KvStore};
use crate::Result;
use std::collections::HashSet;

/// Every key a backup must contain, except chunk keys
///
/// Reads only the post and image indexes: singletons first, then each post's
/// content and comment thread, then each blob's data and metadata keys.
pub async fn enumerate_keys<S: KvStore + ?Sized>(store: &S) -> Result<BackupPlan> {
    let (posts, images) = futures::join!(
        get_json::<_, Vec<PostSummary>>(store, POSTS_INDEX),
        get_json::<_, Vec<BlobDescriptor>>(store, IMAGES_INDEX),
    );
    let posts = posts?.unwrap_or_default();
    let images = images?.unwrap_or_default();

    let mut plan = KeyList::default();
    for key in SINGLETONS {
        plan.push(key.to_string());
    }
    for post in &posts {
        plan.push(keys::post_key(&post.id));
        plan.push(keys::comments_key(&post.id));
    }
    for image in &images {
        plan.push(keys::blob_key(&image.filename));
        plan.push(keys::meta_key(&image.filename));
    }

    Ok(BackupPlan {
        version: BACKUP_VERSION,
        created_at: chrono::Utc::now().to_rfc3339(),
        keys: plan.keys,
        needs_chunk_scan: !images.is_empty(),
    })
}

/// Ordered, duplicate-free key list
#[derive(Default)]
struct KeyList {
    keys: Vec<String>,
    seen: HashSet<String>,
}

impl KeyList {
    fn push(&mut self, key: String) {
        if self.seen.insert(key.clone()) {
            self.keys.push(key);
        }
    }
}
