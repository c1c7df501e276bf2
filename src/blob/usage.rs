//! Finding upload URLs inside content records

use crate::keys::UPLOAD_URL_PREFIX;
use crate::model::{NavLink, PostSummary};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static UPLOAD_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"/uploads/[^\s)"']+"#).expect("upload URL pattern is valid")
});

/// Every `/uploads/...` reference in free text (markdown, HTML, raw JSON)
pub fn upload_urls(text: &str) -> impl Iterator<Item = &str> {
    UPLOAD_URL.find_iter(text).map(|m| m.as_str())
}

/// Set of upload URLs referenced anywhere in the blog's records
#[derive(Debug, Default)]
pub struct UsageSet {
    urls: HashSet<String>,
}

impl UsageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_post_summary(&mut self, post: &PostSummary) {
        if let Some(cover) = &post.cover {
            self.add_url(cover);
        }
    }

    pub fn add_text(&mut self, text: &str) {
        for url in upload_urls(text) {
            self.urls.insert(url.to_string());
        }
    }

    pub fn add_nav_links(&mut self, links: &[NavLink]) {
        for link in links {
            if let Some(image) = &link.image {
                self.add_url(image);
            }
        }
    }

    fn add_url(&mut self, url: &str) {
        if !url.is_empty() {
            self.urls.insert(url.to_string());
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        url.starts_with(UPLOAD_URL_PREFIX) && self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
