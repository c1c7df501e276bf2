//! Blob storage on top of a size-limited key-value store
//!
//! A blob is stored as:
//! - `image_meta:<f>`: [`BlobMeta`] JSON
//! - `image:<f>`: the whole encoded payload, or a chunked marker
//! - `image:<f>:chunk:<i>`: payload slices when the marker is present
//! - one [`BlobDescriptor`] in `images:index`, newest first
//!
//! Writes are independent store calls. An interrupted `put` leaves the blob
//! inconsistent until it is put again or deleted; `delete` copes with any
//! subset of keys being missing.

use super::policy::{generate_filename, UploadPolicy};
use super::usage::UsageSet;
use crate::config::Config;
use crate::keys::{self, IMAGES_INDEX, NAV_LINKS, POSTS_INDEX, SETTINGS};
use crate::model::{
    BlobData, BlobDescriptor, BlobLayout, BlobMeta, BlobUsage, NavLink, Post, PostSummary,
    StoredBlob, Upload, UploadReceipt,
};
use crate::planner::ChunkPlan;
use crate::store::{get_json, put_json, put_many, KvStore};
use crate::{codec, Error, KeyError, Result};
use bytes::Bytes;
use futures::future::join_all;
use tracing::{debug, info, warn};

/// Stores, reads, and deletes blobs and keeps `images:index` in step
///
/// The index is read, modified and written back without coordination, so
/// two concurrent writers can lose each other's entry. Last write wins.
pub struct BlobStore<S> {
    store: S,
    config: Config,
    policy: UploadPolicy,
}

impl<S: KvStore> BlobStore<S> {
    pub fn new(store: S, config: Config) -> Result<Self> {
        config.validate()?;
        let policy = UploadPolicy::from_config(&config);
        Ok(BlobStore {
            store,
            config,
            policy,
        })
    }

    /// Replace the upload policy
    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // === Upload ===

    /// Validate an upload, give it a fresh filename, and store it
    ///
    /// Rejected uploads never touch the store.
    pub async fn upload(&self, upload: Upload) -> Result<UploadReceipt> {
        let ext = self.policy.check(&upload)?;
        let filename = generate_filename(&ext);
        self.put(
            &filename,
            &upload.bytes,
            &upload.content_type,
            &upload.original_name,
            upload.bytes.len() as u64,
        )
        .await?;
        Ok(UploadReceipt {
            url: keys::upload_url(&filename),
            filename,
        })
    }

    // === Put ===

    /// Store `bytes` under `filename` and list it first in the index
    ///
    /// Putting an existing filename replaces it: its index entry moves to the
    /// front and chunks the new payload no longer needs are removed.
    pub async fn put(
        &self,
        filename: &str,
        bytes: &[u8],
        content_type: &str,
        original_name: &str,
        size: u64,
    ) -> Result<()> {
        let encoded = codec::encode(bytes);
        let plan = ChunkPlan::plan(&encoded, self.config.chunk_size)?;
        let total_chunks = plan.total_chunks();

        let meta = BlobMeta {
            content_type: content_type.to_string(),
            size_bytes: size,
            original_name: original_name.to_string(),
            chunked: plan.is_chunked(),
            total_chunks: plan.is_chunked().then_some(total_chunks),
        };

        // Independent reads
        let (previous, index) = futures::join!(self.previous_meta(filename), self.read_index());
        let previous = previous?;
        let mut index = index?;

        let meta_raw = serde_json::to_string(&meta)?;
        let marker;
        let mut writes: Vec<(String, &str)> = Vec::with_capacity(total_chunks as usize + 2);
        match &plan {
            ChunkPlan::Inline(payload) => writes.push((keys::blob_key(filename), *payload)),
            ChunkPlan::Chunked(chunks) => {
                for (i, chunk) in chunks.iter().enumerate() {
                    writes.push((keys::chunk_key(filename, i as u32), *chunk));
                }
                marker = BlobData::Chunked { total_chunks }.render()?;
                writes.push((keys::blob_key(filename), marker.as_str()));
            }
        }
        writes.push((keys::meta_key(filename), meta_raw.as_str()));

        debug!(filename, encoded_len = encoded.len(), total_chunks, "writing blob");
        let failed = put_many(&self.store, &writes).await;

        // Runs even when writes failed: the new metadata may already be in
        // place, and it no longer knows about the old high chunks.
        if let Some(previous) = previous {
            self.delete_chunks(filename, total_chunks..previous.chunk_count())
                .await;
        }

        if !failed.is_empty() {
            warn!(filename, failed = failed.len(), "blob write incomplete");
            return Err(Error::PartialWriteFailure { failed });
        }

        index.retain(|d| d.filename != filename);
        index.insert(
            0,
            BlobDescriptor {
                filename: filename.to_string(),
                content_type: meta.content_type.clone(),
                size_bytes: size,
                original_name: meta.original_name.clone(),
                created_at: chrono::Utc::now().timestamp_millis(),
            },
        );
        put_json(&self.store, IMAGES_INDEX, &index).await?;

        info!(filename, size, total_chunks, "stored blob");
        Ok(())
    }

    // === Get ===

    /// Raw bytes of a blob
    pub async fn get(&self, filename: &str) -> Result<Bytes> {
        Ok(self.fetch(filename).await?.bytes)
    }

    /// Raw bytes of a blob together with its metadata
    ///
    /// Missing metadata or primary value is [`Error::NotFound`]; a missing
    /// chunk or undecodable payload is [`Error::CorruptBlob`].
    pub async fn fetch(&self, filename: &str) -> Result<StoredBlob> {
        let meta = self
            .read_meta(filename)
            .await?
            .ok_or_else(|| Error::NotFound(keys::meta_key(filename)))?;

        let payload = match meta.layout() {
            BlobLayout::Inline => self.read_inline(filename).await?,
            BlobLayout::Chunked { total_chunks } => {
                let key = keys::blob_key(filename);
                let (primary, chunks) = futures::join!(
                    self.store.get(&key),
                    self.read_chunks(filename, total_chunks)
                );
                match primary?.map(BlobData::parse) {
                    None => return Err(Error::NotFound(key)),
                    Some(BlobData::Chunked { total_chunks: n }) if n == total_chunks => {}
                    Some(_) => {
                        return Err(Error::CorruptBlob(format!(
                            "{} does not hold a marker for {} chunks",
                            key, total_chunks
                        )))
                    }
                }
                chunks?
            }
        };

        let bytes = codec::decode(&payload)?;
        if meta.size_bytes != 0 && meta.size_bytes != bytes.len() as u64 {
            warn!(
                filename,
                recorded = meta.size_bytes,
                actual = bytes.len(),
                "blob size differs from metadata"
            );
        }
        Ok(StoredBlob { meta, bytes })
    }

    async fn read_inline(&self, filename: &str) -> Result<String> {
        let key = keys::blob_key(filename);
        match self.store.get(&key).await? {
            None => Err(Error::NotFound(key)),
            Some(raw) => match BlobData::parse(raw) {
                BlobData::Inline(text) => Ok(text),
                BlobData::Chunked { .. } => Err(Error::CorruptBlob(format!(
                    "{} holds a chunk marker but metadata says inline",
                    key
                ))),
            },
        }
    }

    async fn read_chunks(&self, filename: &str, total_chunks: u32) -> Result<String> {
        if total_chunks == 0 {
            return Err(Error::CorruptBlob(format!(
                "{} is chunked without a chunk count",
                keys::meta_key(filename)
            )));
        }

        let chunk_keys: Vec<String> = (0..total_chunks)
            .map(|i| keys::chunk_key(filename, i))
            .collect();
        let results = join_all(chunk_keys.iter().map(|k| self.store.get(k))).await;

        let mut chunks = Vec::with_capacity(results.len());
        let mut missing = Vec::new();
        for (key, result) in chunk_keys.into_iter().zip(results) {
            match result? {
                Some(chunk) => chunks.push(chunk),
                None => missing.push(key),
            }
        }
        if !missing.is_empty() {
            return Err(Error::CorruptBlob(format!(
                "{} of {} chunks missing: {}",
                missing.len(),
                total_chunks,
                missing.join(", ")
            )));
        }
        Ok(chunks.concat())
    }

    // === Delete ===

    /// Remove a blob, its chunks, and its index entry
    ///
    /// Idempotent: deleting an absent or half-written blob succeeds. Chunk
    /// removal is best effort; a failure to remove the primary or metadata
    /// key is returned before the index is touched so a retry can finish.
    pub async fn delete(&self, filename: &str) -> Result<()> {
        let chunk_count = self.discover_chunk_count(filename).await?;

        let primary_keys = [keys::blob_key(filename), keys::meta_key(filename)];
        let (primary, ()) = futures::join!(
            join_all(primary_keys.iter().map(|k| self.store.delete(k))),
            self.delete_chunks(filename, 0..chunk_count),
        );
        let failed: Vec<KeyError> = primary_keys
            .iter()
            .zip(primary)
            .filter_map(|(key, result)| result.err().map(|e| KeyError::new(key.as_str(), e)))
            .collect();
        if !failed.is_empty() {
            return Err(Error::PartialWriteFailure { failed });
        }

        let mut index = self.read_index().await?;
        let before = index.len();
        index.retain(|d| d.filename != filename);
        if index.len() != before {
            put_json(&self.store, IMAGES_INDEX, &index).await?;
        }

        info!(filename, chunk_count, "deleted blob");
        Ok(())
    }

    /// Chunk count from the metadata, or from the primary marker when the
    /// metadata is gone
    async fn discover_chunk_count(&self, filename: &str) -> Result<u32> {
        match self.previous_meta(filename).await? {
            Some(meta) => Ok(meta.chunk_count()),
            None => match self.store.get(&keys::blob_key(filename)).await? {
                Some(raw) => match BlobData::parse(raw) {
                    BlobData::Chunked { total_chunks } => Ok(total_chunks),
                    BlobData::Inline(_) => Ok(0),
                },
                None => Ok(0),
            },
        }
    }

    async fn delete_chunks(&self, filename: &str, range: std::ops::Range<u32>) {
        if range.is_empty() {
            return;
        }
        let chunk_keys: Vec<String> = range.map(|i| keys::chunk_key(filename, i)).collect();
        let results = join_all(chunk_keys.iter().map(|k| self.store.delete(k))).await;
        for (key, result) in chunk_keys.iter().zip(results) {
            if let Err(e) = result {
                warn!(key = key.as_str(), error = %e, "ignoring failed chunk delete");
            }
        }
    }

    // === Listing ===

    /// The blob index, newest first
    pub async fn list(&self) -> Result<Vec<BlobDescriptor>> {
        self.read_index().await
    }

    /// The blob index with a `used` flag per blob
    ///
    /// A blob counts as used when its URL appears as a post cover, in a post
    /// body, anywhere in the site settings, or as a navigation link image.
    /// Informational only; nothing is ever removed based on it.
    pub async fn list_usage(&self) -> Result<Vec<BlobUsage>> {
        let (images, posts, settings, nav) = futures::join!(
            self.read_index(),
            get_json::<_, Vec<PostSummary>>(&self.store, POSTS_INDEX),
            self.store.get(SETTINGS),
            self.store.get(NAV_LINKS),
        );
        let images = images?;
        let posts = posts?.unwrap_or_default();

        let mut used = UsageSet::new();
        for post in &posts {
            used.add_post_summary(post);
        }

        let post_keys: Vec<String> = posts.iter().map(|p| keys::post_key(&p.id)).collect();
        let bodies = join_all(post_keys.iter().map(|k| self.store.get(k))).await;
        for (key, body) in post_keys.iter().zip(bodies) {
            let Some(raw) = body? else { continue };
            match serde_json::from_str::<Post>(&raw) {
                Ok(post) => used.add_text(post.content.as_deref().unwrap_or_default()),
                Err(e) => warn!(key = key.as_str(), error = %e, "skipping unreadable post"),
            }
        }

        if let Some(raw) = settings? {
            used.add_text(&raw);
        }
        if let Some(raw) = nav? {
            // Anything other than a list of links is ignored
            if let Ok(links) = serde_json::from_str::<Vec<NavLink>>(&raw) {
                used.add_nav_links(&links);
            }
        }

        Ok(images
            .into_iter()
            .map(|descriptor| {
                let url = keys::upload_url(&descriptor.filename);
                BlobUsage {
                    used: used.contains(&url),
                    url,
                    descriptor,
                }
            })
            .collect())
    }

    // === Helpers ===

    async fn read_index(&self) -> Result<Vec<BlobDescriptor>> {
        Ok(get_json(&self.store, IMAGES_INDEX).await?.unwrap_or_default())
    }

    /// Metadata for reading; unparseable metadata is corruption
    async fn read_meta(&self, filename: &str) -> Result<Option<BlobMeta>> {
        let key = keys::meta_key(filename);
        match self.store.get(&key).await? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| Error::CorruptBlob(format!("{}: {}", key, e))),
        }
    }

    /// Metadata for cleanup; unparseable metadata is treated as absent
    async fn previous_meta(&self, filename: &str) -> Result<Option<BlobMeta>> {
        match self.read_meta(filename).await {
            Err(Error::CorruptBlob(reason)) => {
                warn!(filename, reason = reason.as_str(), "ignoring unreadable metadata");
                Ok(None)
            }
            other => other,
        }
    }
}
