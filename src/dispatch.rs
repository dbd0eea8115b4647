// src/dispatch.rs
//! # Incremental dispatcher
//! Decides which entries of one source are new relative to its cursor, sends them,
//! and computes the source's next cursor.
//!
//! Policy:
//! - No cursor yet: send exactly one entry, the **oldest** of the current batch, as a
//!   baseline. The backlog is deliberately not replayed.
//! - Cursor known: walk newest → oldest and send every entry until one whose
//!   identifier equals the cursor. If none matches (the feed rotated past it), the
//!   whole batch is sent.
//! - The next cursor is always the identifier of the newest entry, whatever the
//!   delivery outcome. A failed delivery is logged and skipped, never retried here.

use metrics::counter;
use serde_json::Value;

use crate::config::{DeliveryOrder, SourceConfig};
use crate::extract::{extract, Scopes};
use crate::format::format_entry;
use crate::ingest::ParsedFeed;
use crate::notify::{announcement, display_name, NotificationSink};

/// Knobs shared by all sources of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    pub order: DeliveryOrder,
    /// Keep only the newest N selected entries.
    pub max_deliveries: Option<usize>,
}

/// What one source's dispatch did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutcome {
    /// Identifier of the newest entry. `None` for an empty feed or when the newest
    /// entry has no identifier.
    pub cursor: Option<Value>,
    pub first_run: bool,
    /// Entries found newer than the cursor (before any cap).
    pub selected: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Entries dropped by `max_deliveries`.
    pub capped: usize,
}

/// Identifier of `entry` under `id_field`; null counts as no identifier.
///
/// A bare key such as the default `"id"` names a field of the entry, so it reads
/// the same as `$entry.id`. `$` paths go through the extractor.
pub fn entry_id<'a>(feed: &'a Value, entry: &'a Value, id_field: &'a Value) -> Option<&'a Value> {
    let found = match id_field {
        Value::String(key) if !key.starts_with('$') => entry.get(key.as_str()),
        _ => extract(&Scopes::new(feed, entry), id_field).found(),
    };
    found.filter(|v| !v.is_null())
}

/// Indices (into `entries`) to deliver, newest first.
pub fn select_new(
    feed: &Value,
    entries: &[Value],
    id_field: &Value,
    prior: Option<&Value>,
) -> Vec<usize> {
    if entries.is_empty() {
        return Vec::new();
    }
    let Some(prior) = prior else {
        return vec![entries.len() - 1];
    };
    entries
        .iter()
        .take_while(|entry| entry_id(feed, entry, id_field) != Some(prior))
        .enumerate()
        .map(|(i, _)| i)
        .collect()
}

/// Run the incremental delivery for one source.
pub async fn dispatch(
    source: &SourceConfig,
    parsed: &ParsedFeed,
    prior: Option<&Value>,
    opts: DispatchOptions,
    sink: &dyn NotificationSink,
) -> DispatchOutcome {
    let name = source.name.as_str();
    let Some(newest) = parsed.entries.first() else {
        tracing::info!(source = name, "feed has no entries, nothing to do");
        return DispatchOutcome::default();
    };

    let cursor = entry_id(&parsed.feed, newest, &source.id).cloned();
    if cursor.is_none() {
        tracing::warn!(
            source = name,
            id_field = %source.id,
            "newest entry has no identifier; cursor will not advance"
        );
    }

    let mut picked = select_new(&parsed.feed, &parsed.entries, &source.id, prior);
    let selected = picked.len();
    let capped = match opts.max_deliveries {
        Some(max) if selected > max => {
            picked.truncate(max);
            selected - max
        }
        _ => 0,
    };
    if capped > 0 {
        tracing::warn!(source = name, selected, capped, "too many new entries, sending newest only");
    }
    if opts.order == DeliveryOrder::OldestFirst {
        picked.reverse();
    }

    let sender = display_name(name);
    let text = announcement(name);
    let mut outcome = DispatchOutcome {
        cursor,
        first_run: prior.is_none(),
        selected,
        capped,
        ..DispatchOutcome::default()
    };

    for idx in picked {
        let entry = &parsed.entries[idx];
        let payload = format_entry(&parsed.feed, entry, name, &source.embed);
        match sink.send(&sender, &text, &payload).await {
            Ok(()) => {
                outcome.delivered += 1;
                counter!("feedhook_deliveries_total").increment(1);
            }
            Err(e) => {
                outcome.failed += 1;
                counter!("feedhook_delivery_errors_total").increment(1);
                tracing::warn!(
                    source = name,
                    error = %e,
                    title = payload.title.as_deref().unwrap_or_default(),
                    "delivery failed, continuing"
                );
            }
        }
    }

    tracing::info!(
        source = name,
        first_run = outcome.first_run,
        delivered = outcome.delivered,
        failed = outcome.failed,
        "source dispatched"
    );
    outcome
}
