// src/ingest/fetcher.rs
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Client;

use crate::error::FetchError;
use crate::ingest::parser::parse_feed;
use crate::ingest::types::{FeedFetcher, ParsedFeed};

/// Fetches feeds over HTTP(S); anything else is read as a local file path
/// (`file://` prefix optional).
#[derive(Clone)]
pub struct HttpFeedFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFeedFetcher {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    async fn download(&self, url: &str) -> Result<String, FetchError> {
        let http_err = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };
        self.client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(http_err)?
            .error_for_status()
            .map_err(http_err)?
            .text()
            .await
            .map_err(http_err)
    }

    async fn read_file(url: &str) -> Result<String, FetchError> {
        let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| FetchError::File { path, source })
    }
}

impl Default for HttpFeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed, FetchError> {
        let t0 = Instant::now();
        let body = if url.starts_with("http://") || url.starts_with("https://") {
            self.download(url).await
        } else {
            Self::read_file(url).await
        };
        let body = match body {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, url, "feed download failed");
                counter!("feedhook_fetch_errors_total").increment(1);
                return Err(e);
            }
        };

        let parsed = parse_feed(&body, url);
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feedhook_fetch_ms").record(ms);
        match &parsed {
            Ok(feed) => tracing::debug!(url, entries = feed.entries.len(), ms, "feed parsed"),
            Err(_) => counter!("feedhook_fetch_errors_total").increment(1),
        }
        parsed
    }
}
