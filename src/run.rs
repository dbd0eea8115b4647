// src/run.rs
//! One relay run: every configured source, one cursor commit at the end.

use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

use crate::config::Config;
use crate::cursor::{CursorMap, CursorStore};
use crate::dispatch::{dispatch, DispatchOptions, DispatchOutcome};
use crate::error::Result;
use crate::ingest::FeedFetcher;
use crate::notify::NotificationSink;

/// One-time metrics registration (so series show up once a recorder is installed).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feedhook_runs_total", "Completed relay runs.");
        describe_counter!(
            "feedhook_fetch_errors_total",
            "Feed downloads or parses that failed."
        );
        describe_counter!(
            "feedhook_deliveries_total",
            "Notifications accepted by the sink."
        );
        describe_counter!(
            "feedhook_delivery_errors_total",
            "Notifications the sink failed to deliver."
        );
        describe_histogram!("feedhook_fetch_ms", "Feed fetch + parse time in milliseconds.");
    });
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceStatus {
    Dispatched(DispatchOutcome),
    /// Feed could not be fetched or parsed; the previous cursor was kept.
    FetchFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub name: String,
    pub status: SourceStatus,
}

/// Summary of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
    /// Cursor map as it stands after the run.
    pub cursors: CursorMap,
    /// Whether the cursor store was written.
    pub committed: bool,
}

impl RunReport {
    pub fn delivered(&self) -> usize {
        self.outcomes().map(|o| o.delivered).sum()
    }

    pub fn failed_deliveries(&self) -> usize {
        self.outcomes().map(|o| o.failed).sum()
    }

    pub fn failed_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s.status, SourceStatus::FetchFailed(_)))
            .count()
    }

    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.name == name)
    }

    fn outcomes(&self) -> impl Iterator<Item = &DispatchOutcome> {
        self.sources.iter().filter_map(|s| match &s.status {
            SourceStatus::Dispatched(o) => Some(o),
            SourceStatus::FetchFailed(_) => None,
        })
    }
}

/// Process all sources in configuration order and commit the new cursors if they changed.
///
/// A source whose feed fails to load, is empty, or whose newest entry lacks an
/// identifier keeps its previous cursor. Sources dropped from the configuration
/// disappear from the committed map.
pub async fn run_once(
    config: &Config,
    fetcher: &dyn FeedFetcher,
    sink: &dyn NotificationSink,
    store: &dyn CursorStore,
) -> Result<RunReport> {
    ensure_metrics_described();

    let loaded = store.load().await?;
    let opts = DispatchOptions {
        order: config.delivery_order,
        max_deliveries: config.max_deliveries,
    };

    let mut next = CursorMap::new();
    let mut reports = Vec::with_capacity(config.sources.len());

    for source in &config.sources {
        let name = source.name.clone();
        let prior = loaded.get(&name);
        tracing::info!(source = %name, feed = %source.feed, "loading");

        let status = match fetcher.fetch(&source.feed).await {
            Ok(parsed) => {
                let outcome = dispatch(source, &parsed, prior, opts, sink).await;
                if let Some(cursor) = outcome.cursor.clone().or_else(|| prior.cloned()) {
                    next.insert(name.clone(), cursor);
                }
                SourceStatus::Dispatched(outcome)
            }
            Err(e) => {
                tracing::warn!(source = %name, error = %e, "fetch failed, skipping source");
                if let Some(cursor) = prior {
                    next.insert(name.clone(), cursor.clone());
                }
                SourceStatus::FetchFailed(e.to_string())
            }
        };
        reports.push(SourceReport { name, status });
    }

    let committed = if next != loaded {
        store.commit(&next).await?;
        true
    } else {
        tracing::debug!("cursors unchanged, skipping write");
        false
    };

    counter!("feedhook_runs_total").increment(1);

    let report = RunReport {
        sources: reports,
        cursors: next,
        committed,
    };
    tracing::info!(
        target: "feedhook::run",
        sources = report.sources.len(),
        delivered = report.delivered(),
        failed_deliveries = report.failed_deliveries(),
        failed_sources = report.failed_sources(),
        committed,
        "run finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeliveryOrder, EmbedFields, SourceConfig};
    use crate::cursor::MemoryCursorStore;
    use crate::ingest::FixtureFetcher;
    use crate::notify::RecordingSink;
    use serde_json::json;

    fn rss(ids: &[&str]) -> String {
        let items: String = ids
            .iter()
            .map(|id| format!("<item><guid>{id}</guid><title>{id}</title></item>"))
            .collect();
        format!("<rss><channel><title>T</title>{items}</channel></rss>")
    }

    fn config(names: &[&str]) -> Config {
        Config {
            webhook: "https://discord.test/hook".into(),
            sources: names
                .iter()
                .map(|n| {
                    SourceConfig::new(*n, format!("mem://{n}")).with_embed(EmbedFields {
                        title: Some(json!("$entry.title")),
                        ..Default::default()
                    })
                })
                .collect(),
            delivery_order: DeliveryOrder::NewestFirst,
            max_deliveries: None,
            request_timeout_secs: 10,
            max_retries: 3,
        }
    }

    #[tokio::test]
    async fn fetch_failure_keeps_old_cursor_and_other_sources_run() {
        let cfg = config(&["broken", "ok"]);
        let fetcher = FixtureFetcher::new().with("mem://ok", rss(&["2", "1"]));
        let sink = RecordingSink::new();
        let mut prior = CursorMap::new();
        prior.insert("broken".into(), json!("b-7"));
        prior.insert("ok".into(), json!("1"));
        let store = MemoryCursorStore::with_cursors(prior);

        let report = run_once(&cfg, &fetcher, &sink, &store).await.unwrap();

        assert_eq!(sink.titles(), vec!["2"]);
        assert_eq!(report.failed_sources(), 1);
        let saved = store.snapshot();
        assert_eq!(saved["broken"], json!("b-7"));
        assert_eq!(saved["ok"], json!("2"));
        assert!(report.committed);
    }

    #[tokio::test]
    async fn unchanged_cursors_skip_the_commit() {
        let cfg = config(&["a"]);
        let fetcher = FixtureFetcher::new().with("mem://a", rss(&["9", "8"]));
        let sink = RecordingSink::new();
        let mut prior = CursorMap::new();
        prior.insert("a".into(), json!("9"));
        let store = MemoryCursorStore::with_cursors(prior);

        let report = run_once(&cfg, &fetcher, &sink, &store).await.unwrap();
        assert!(!report.committed);
        assert_eq!(store.commit_count(), 0);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn removed_sources_are_dropped_from_the_map() {
        let cfg = config(&["kept"]);
        let fetcher = FixtureFetcher::new().with("mem://kept", rss(&["1"]));
        let sink = RecordingSink::new();
        let mut prior = CursorMap::new();
        prior.insert("kept".into(), json!("1"));
        prior.insert("gone".into(), json!("x"));
        let store = MemoryCursorStore::with_cursors(prior);

        let report = run_once(&cfg, &fetcher, &sink, &store).await.unwrap();
        assert!(report.committed);
        assert_eq!(store.snapshot().len(), 1);
        assert!(store.snapshot().contains_key("kept"));
    }

    #[tokio::test]
    async fn empty_feed_carries_cursor_forward() {
        let cfg = config(&["quiet"]);
        let fetcher =
            FixtureFetcher::new().with("mem://quiet", "<rss><channel><title>Q</title></channel></rss>");
        let sink = RecordingSink::new();
        let mut prior = CursorMap::new();
        prior.insert("quiet".into(), json!("5"));
        let store = MemoryCursorStore::with_cursors(prior.clone());

        let report = run_once(&cfg, &fetcher, &sink, &store).await.unwrap();
        assert_eq!(report.cursors, prior);
        assert!(!report.committed);
    }
}
