//! Remote REST key-value namespace
//!
//! `GET`, `PUT` and `DELETE` on `{base}/{key}`, with the key sent as a single
//! percent-encoded path segment.

use super::KvStore;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

/// A store backed by an HTTP key-value API
#[derive(Clone, Debug)]
pub struct HttpStore {
    base: Url,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid store URL {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!("store URL {} cannot be a base", base_url)));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(HttpStore {
            base,
            token,
            client,
        })
    }

    /// Configure from `BLOGKV_HTTP_URL` and optional `BLOGKV_HTTP_TOKEN`
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("BLOGKV_HTTP_URL")
            .map_err(|_| Error::Config("BLOGKV_HTTP_URL is not set".into()))?;
        Self::new(&url, std::env::var("BLOGKV_HTTP_TOKEN").ok())
    }

    fn url_for(&self, key: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config("store URL cannot be a base".into()))?
            .pop_if_empty()
            .push(key);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, key: &str) -> Result<reqwest::RequestBuilder> {
        let builder = self.client.request(method, self.url_for(key)?);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }
}

fn status_error(op: &str, key: &str, status: StatusCode) -> Error {
    Error::Http(format!("{} {} returned {}", op, key, status))
}

#[async_trait]
impl KvStore for HttpStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let resp = self
            .request(reqwest::Method::GET, key)?
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
                Ok(Some(text))
            }
            s => Err(status_error("GET", key, s)),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        debug!(key, len = value.len(), "http put");
        let resp = self
            .request(reqwest::Method::PUT, key)?
            .body(value.to_string())
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(status_error("PUT", key, resp.status()));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let resp = self
            .request(reqwest::Method::DELETE, key)?
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(()),
            s if s.is_success() => Ok(()),
            s => Err(status_error("DELETE", key, s)),
        }
    }
}
