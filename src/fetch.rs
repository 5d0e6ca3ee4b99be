//! Resource fetch layer: URL resolution and text retrieval

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::FetchError;

/// Resolve a logical file name to a fetchable URL
pub trait UrlResolver: Send + Sync {
    fn to_url(&self, name: &str) -> String;
}

/// Pass the name through unchanged
pub struct IdentityResolver;

impl UrlResolver for IdentityResolver {
    fn to_url(&self, name: &str) -> String {
        name.to_string()
    }
}

/// Join names onto a base URL or directory prefix
pub struct BaseUrlResolver {
    base: String,
}

impl BaseUrlResolver {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }
}

impl UrlResolver for BaseUrlResolver {
    fn to_url(&self, name: &str) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), name)
    }
}

/// Fetch text content from a resolved URL
#[async_trait]
pub trait TextFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetch over HTTP(S) with a bounded request timeout
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        debug!(timeout_ms = timeout.as_millis() as u64, "HttpFetcher::new: called");
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("hbload/0.1")
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::DEFAULT_FETCH_TIMEOUT_MS))
    }
}

#[async_trait]
impl TextFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        debug!(%url, "HttpFetcher::fetch_text: called");
        if !url.starts_with("http://") && !url.starts_with("https://") {
            debug!(%url, "HttpFetcher::fetch_text: invalid URL protocol");
            return Err(FetchError::InvalidUrl { url: url.to_string() });
        }

        let response = self.client.get(url).send().await?;
        debug!(status = %response.status(), "HttpFetcher::fetch_text: HTTP response received");

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let text = response.text().await?;
        debug!(text_len = text.len(), "HttpFetcher::fetch_text: body read");
        Ok(text)
    }
}

/// Read templates from a directory tree
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl TextFetcher for FileFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let path = self.root.join(url);
        debug!(path = %path.display(), "FileFetcher::fetch_text: called");
        Ok(tokio::fs::read_to_string(&path).await?)
    }
}

/// In-memory fetcher for embedded templates and tests
#[derive(Debug, Default)]
pub struct MapFetcher {
    entries: HashMap<String, String>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, builder style
    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.entries.insert(name.into(), text.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(name.into(), text.into());
    }
}

#[async_trait]
impl TextFetcher for MapFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        debug!(%url, "MapFetcher::fetch_text: called");
        self.entries
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound { resource: url.to_string() })
    }
}
