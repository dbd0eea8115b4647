// src/ingest/types.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FetchError;

/// A parsed feed: channel-level metadata plus entries in document order (newest first).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedFeed {
    pub feed: Value,
    pub entries: Vec<Value>,
}

impl ParsedFeed {
    pub fn new(feed: Value, entries: Vec<Value>) -> Self {
        Self { feed, entries }
    }
}

#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed, FetchError>;
}
