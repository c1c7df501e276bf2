//! Key-value store backends
//!
//! Everything above this module talks to storage through [`KvStore`], a
//! three-call text key-value interface. Each call is one round trip to the
//! backing service, and hosts typically cap how many of them a single
//! request may issue; [`QuotaStore`] models that cap.
//!
//! Backends:
//! - [`MemoryStore`] keeps values in memory (tests, dry runs)
//! - [`FileStore`] keeps values in a single JSON file (the CLI)
//! - `HttpStore` talks to a remote REST namespace (feature `http-store`)

mod file;
mod memory;
mod quota;

#[cfg(feature = "http-store")]
mod http;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use quota::QuotaStore;

#[cfg(feature = "http-store")]
pub use http::HttpStore;

use crate::{KeyError, Result};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

/// A text key-value store
///
/// Implementations must treat deleting an absent key as success.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value, `None` if the key does not exist
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any existing one
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; absent keys are not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }
}

#[async_trait]
impl<S: KvStore + ?Sized> KvStore for &S {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }
}

/// Read a JSON value, `None` if the key is absent
pub(crate) async fn get_json<S, T>(store: &S, key: &str) -> Result<Option<T>>
where
    S: KvStore + ?Sized,
    T: serde::de::DeserializeOwned,
{
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Write a value as JSON
pub(crate) async fn put_json<S, T>(store: &S, key: &str, value: &T) -> Result<()>
where
    S: KvStore + ?Sized,
    T: serde::Serialize + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw).await
}

/// Issue independent writes concurrently and report every key that failed
///
/// All writes are attempted; one failure does not cancel the others.
pub(crate) async fn put_many<S, K, V>(store: &S, items: &[(K, V)]) -> Vec<KeyError>
where
    S: KvStore + ?Sized,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let results = join_all(
        items
            .iter()
            .map(|(key, value)| store.put(key.as_ref(), value.as_ref())),
    )
    .await;

    items
        .iter()
        .zip(results)
        .filter_map(|((key, _), result)| result.err().map(|e| KeyError::new(key.as_ref(), e)))
        .collect()
}
