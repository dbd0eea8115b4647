// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod cursor;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod format;
pub mod ingest;
pub mod notify;
pub mod run;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ---- Re-exports for stable public API ----
pub use crate::config::{Config, DeliveryOrder, EmbedFields, SourceConfig};
pub use crate::cursor::{CursorMap, CursorStore, JsonFileCursorStore};
pub use crate::dispatch::{dispatch, DispatchOptions, DispatchOutcome};
pub use crate::extract::{extract, Extracted, Scope, Scopes};
pub use crate::format::format_entry;
pub use crate::ingest::{FeedFetcher, HttpFeedFetcher, ParsedFeed};
pub use crate::notify::{DiscordWebhook, NotificationPayload, NotificationSink};
pub use crate::run::{run_once, RunReport, SourceReport, SourceStatus};
