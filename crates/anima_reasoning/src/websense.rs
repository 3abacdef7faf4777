//! The web sense seam: search and fetch behind a trait, never called from
//! the tick path. Fakes live here so gates can be tested without a
//! network.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub text: String,
    pub fetched_ms: u64,
}

#[async_trait]
pub trait WebSense: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>>;
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Document>;
}

/// Offline stand-in: empty search results, failing fetch.
pub struct NullWebSense;

#[async_trait]
impl WebSense for NullWebSense {
    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<SearchResult>> {
        Ok(Vec::new())
    }

    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<Document> {
        Err(anyhow!("web sense disabled, cannot fetch {url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_websense() {
        let w = NullWebSense;
        assert!(w.search("anything", 3).await.unwrap().is_empty());
        assert!(w
            .fetch("https://example.com", Duration::from_secs(30))
            .await
            .is_err());
    }
}
