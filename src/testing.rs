// src/testing.rs
//! In-memory stand-ins for the relay's seams, for tests and local experiments.
//! Compiled for this crate's own tests, or with the `testing` feature.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cursor::{CursorMap, CursorStore};
use crate::error::{DeliveryError, FetchError, PersistError};
use crate::ingest::{parse_feed, FeedFetcher, ParsedFeed};
use crate::notify::{NotificationPayload, NotificationSink};

/// Serves feeds from in-memory XML keyed by URL; unknown URLs fail with a parse error.
pub struct FixtureFetcher {
    documents: HashMap<String, String>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
        }
    }

    pub fn with(mut self, url: impl Into<String>, xml: impl Into<String>) -> Self {
        self.documents.insert(url.into(), xml.into());
        self
    }

    pub fn set(&mut self, url: impl Into<String>, xml: impl Into<String>) {
        self.documents.insert(url.into(), xml.into());
    }
}

impl Default for FixtureFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed, FetchError> {
        let xml = self
            .documents
            .get(url)
            .ok_or_else(|| FetchError::parse(url, "no fixture registered"))?;
        parse_feed(xml, url)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub display_name: String,
    pub announcement: String,
    pub payload: NotificationPayload,
}

/// Records every notification; payloads whose title is listed in `fail_titles` are rejected.
pub struct RecordingSink {
    sent: Mutex<Vec<SentNotification>>,
    fail_titles: HashSet<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(vec![]),
            fail_titles: HashSet::new(),
        }
    }

    pub fn failing_on(titles: &[&str]) -> Self {
        Self {
            sent: Mutex::new(vec![]),
            fail_titles: titles.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Titles of successfully recorded notifications, in delivery order.
    pub fn titles(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| s.payload.title)
            .collect()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(
        &self,
        display_name: &str,
        announcement: &str,
        payload: &NotificationPayload,
    ) -> Result<(), DeliveryError> {
        if let Some(title) = &payload.title {
            if self.fail_titles.contains(title) {
                return Err(DeliveryError::Rejected(format!("refusing `{title}`")));
            }
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentNotification {
                display_name: display_name.to_string(),
                announcement: announcement.to_string(),
                payload: payload.clone(),
            });
        }
        Ok(())
    }
}

/// In-memory store that counts commits.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    state: Mutex<CursorMap>,
    commits: Mutex<usize>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursors(cursors: CursorMap) -> Self {
        Self {
            state: Mutex::new(cursors),
            commits: Mutex::new(0),
        }
    }

    pub fn snapshot(&self) -> CursorMap {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.lock().map(|c| *c).unwrap_or_default()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> Result<CursorMap, PersistError> {
        Ok(self.snapshot())
    }

    async fn commit(&self, cursors: &CursorMap) -> Result<(), PersistError> {
        if let Ok(mut state) = self.state.lock() {
            *state = cursors.clone();
        }
        if let Ok(mut commits) = self.commits.lock() {
            *commits += 1;
        }
        Ok(())
    }
}
