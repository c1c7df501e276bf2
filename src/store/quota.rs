//! Per-request call metering

use super::KvStore;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use tracing::debug;

/// Wraps a store and fails every call past a fixed budget
///
/// One `QuotaStore` stands for one inbound request: create it when the
/// request starts and drop it when the response is sent. Calls over the
/// budget never reach the inner store.
#[derive(Debug)]
pub struct QuotaStore<S> {
    inner: S,
    limit: usize,
    calls: AtomicUsize,
}

impl<S: KvStore> QuotaStore<S> {
    pub fn new(inner: S, limit: usize) -> Self {
        QuotaStore {
            inner,
            limit,
            calls: AtomicUsize::new(0),
        }
    }

    /// Calls attempted so far, including rejected ones
    pub fn calls(&self) -> usize {
        self.calls.load(Relaxed)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn charge(&self, op: &str, key: &str) -> Result<()> {
        let n = self.calls.fetch_add(1, Relaxed) + 1;
        if n > self.limit {
            debug!(op, key, calls = n, limit = self.limit, "store call over quota");
            return Err(Error::QuotaExceeded { limit: self.limit });
        }
        Ok(())
    }
}

#[async_trait]
impl<S: KvStore> KvStore for QuotaStore<S> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.charge("get", key)?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.charge("put", key)?;
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.charge("delete", key)?;
        self.inner.delete(key).await
    }
}
