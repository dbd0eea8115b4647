// src/ingest/mod.rs
//! Feed retrieval: download (or read) a feed document and turn it into trees.

pub mod fetcher;
pub mod parser;
pub mod types;

pub use fetcher::HttpFeedFetcher;
#[cfg(any(test, feature = "testing"))]
pub use crate::testing::FixtureFetcher;
pub use parser::parse_feed;
pub use types::{FeedFetcher, ParsedFeed};
