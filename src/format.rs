// src/format.rs
//! Entry formatting: one feed entry + field mapping → [`NotificationPayload`].

use serde_json::Value;

use crate::config::EmbedFields;
use crate::extract::{extract, Extracted, Scopes};
use crate::notify::NotificationPayload;

/// Bodies longer than this many characters are cut.
pub const BODY_LIMIT: usize = 2000;
pub const TRUNCATION_MARKER: &str = "...";

/// Build the notification for `entry`. Pure.
pub fn format_entry(
    feed: &Value,
    entry: &Value,
    source_name: &str,
    fields: &EmbedFields,
) -> NotificationPayload {
    let scopes = Scopes::new(feed, entry);
    let text = |field: &Option<Value>| field.as_ref().and_then(|f| extract(&scopes, f).text());

    NotificationPayload {
        source_name: source_name.to_string(),
        title: text(&fields.title),
        url: text(&fields.url),
        body: text(&fields.body).map(truncate_body),
        colour: fields
            .colour()
            .and_then(|c| extract(&scopes, c).found())
            .and_then(parse_colour),
        thumbnail: fields
            .thumbnail
            .as_ref()
            .map(|t| extract(&scopes, t))
            .filter(|t| is_truthy(*t))
            .and_then(Extracted::text),
    }
}

/// Cut to [`BODY_LIMIT`] characters and append [`TRUNCATION_MARKER`]; shorter bodies pass through.
pub fn truncate_body(body: String) -> String {
    match body.char_indices().nth(BODY_LIMIT) {
        Some((cut, _)) => {
            let mut out = body[..cut].to_string();
            out.push_str(TRUNCATION_MARKER);
            out
        }
        None => body,
    }
}

/// Integer, or a string in decimal, `#RRGGBB` or `0xRRGGBB` form.
pub fn parse_colour(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix('#').or_else(|| s.strip_prefix("0x")) {
                u32::from_str_radix(hex, 16).ok()
            } else {
                s.parse().ok()
            }
        }
        _ => None,
    }
}

fn is_truthy(v: Extracted<'_>) -> bool {
    match v.found() {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}
