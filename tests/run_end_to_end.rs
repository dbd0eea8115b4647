// tests/run_end_to_end.rs
use feedhook::config::Config;
use feedhook::cursor::{CursorStore, JsonFileCursorStore};
use feedhook::ingest::FixtureFetcher;
use feedhook::notify::RecordingSink;
use feedhook::{run_once, SourceStatus};
use serde_json::json;

const BLOG_XML: &str = include_str!("fixtures/blog_rss.xml");
const ATOM_XML: &str = include_str!("fixtures/releases_atom.xml");

const CONFIG: &str = r#"
webhook: https://discord.test/api/webhooks/1/token
sources:
  blog:
    feed: mem://blog
    embed:
      title: $entry.title
      url: $entry.link
      body: $entry.summary
      colour: 3447003
      thumbnail: $entry.media_thumbnail.0.url
  releases:
    feed: mem://releases
    id: $entry.link
    embed:
      title: $entry.title
      url: $entry.link
      thumbnail: $feed.image.href
"#;

fn load_config(dir: &std::path::Path) -> Config {
    let path = dir.join("config.yaml");
    std::fs::write(&path, CONFIG).unwrap();
    Config::load_from(&path).unwrap()
}

#[tokio::test]
async fn first_run_then_quiet_run_then_new_entries() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config(dir.path());
    let store = JsonFileCursorStore::new(dir.path().join(".cache.json"));

    let blog_tail = BLOG_XML
        .split("<item>")
        .enumerate()
        .filter(|(i, _)| *i != 1 && *i != 2)
        .map(|(_, chunk)| chunk)
        .collect::<Vec<_>>()
        .join("<item>");
    let mut fetcher = FixtureFetcher::new()
        .with("mem://blog", blog_tail)
        .with("mem://releases", ATOM_XML);

    // 1) nothing stored: one baseline notification per source, from the oldest entry
    let sink = RecordingSink::new();
    let report = run_once(&cfg, &fetcher, &sink, &store).await.unwrap();
    assert_eq!(sink.titles(), vec!["Shipping 41", "v2.0.0"]);
    assert!(report.committed);

    let first = sink.sent();
    assert_eq!(first[0].display_name, "blog RSS Feed");
    assert_eq!(first[0].announcement, "New post in blog!");
    assert_eq!(first[0].payload.colour, Some(3447003));
    assert_eq!(first[0].payload.body.as_deref(), Some("Release notes for 41."));
    assert_eq!(first[0].payload.thumbnail, None);
    assert_eq!(
        first[1].payload.thumbnail.as_deref(),
        Some("https://releases.example.test/favicon.png")
    );

    let stored = store.load().await.unwrap();
    assert_eq!(stored["blog"], json!("43"));
    assert_eq!(stored["releases"], json!("https://releases.example.test/v2.1.0"));

    // 2) same documents again: nothing sent, nothing written
    let sink = RecordingSink::new();
    let report = run_once(&cfg, &fetcher, &sink, &store).await.unwrap();
    assert!(sink.sent().is_empty());
    assert!(!report.committed);
    assert_eq!(store.load().await.unwrap(), stored);

    // 3) two posts appear on the blog
    fetcher.set("mem://blog", BLOG_XML);
    let sink = RecordingSink::new();
    let report = run_once(&cfg, &fetcher, &sink, &store).await.unwrap();
    assert_eq!(sink.titles(), vec!["Shipping 45", "Shipping 44"]);
    assert_eq!(
        sink.sent()[0].payload.thumbnail.as_deref(),
        Some("https://blog.example.test/img/45.jpg")
    );
    assert!(report.committed);
    assert_eq!(store.load().await.unwrap()["blog"], json!("45"));

    match &report.source("releases").unwrap().status {
        SourceStatus::Dispatched(o) => assert_eq!(o.delivered, 0),
        other => panic!("unexpected status {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_feed_is_retried_next_run_with_old_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config(dir.path());
    let store = JsonFileCursorStore::new(dir.path().join(".cache.json"));
    std::fs::write(
        store.path(),
        r#"{"blog": "42", "releases": "https://releases.example.test/v2.0.0"}"#,
    )
    .unwrap();

    // blog feed missing this run
    let mut fetcher = FixtureFetcher::new().with("mem://releases", ATOM_XML);
    let sink = RecordingSink::new();
    let report = run_once(&cfg, &fetcher, &sink, &store).await.unwrap();
    assert_eq!(report.failed_sources(), 1);
    assert_eq!(sink.titles(), vec!["v2.1.0"]);
    assert_eq!(store.load().await.unwrap()["blog"], json!("42"));

    // back online: everything newer than 42 goes out
    fetcher.set("mem://blog", BLOG_XML);
    let sink = RecordingSink::new();
    run_once(&cfg, &fetcher, &sink, &store).await.unwrap();
    assert_eq!(sink.titles(), vec!["Shipping 45", "Shipping 44", "Shipping 43"]);
}

#[tokio::test]
async fn rejected_delivery_still_advances_the_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config(dir.path());
    let store = JsonFileCursorStore::new(dir.path().join(".cache.json"));
    std::fs::write(store.path(), r#"{"blog": "42"}"#).unwrap();

    let fetcher = FixtureFetcher::new()
        .with("mem://blog", BLOG_XML)
        .with("mem://releases", ATOM_XML);
    let sink = RecordingSink::failing_on(&["Shipping 44"]);
    let report = run_once(&cfg, &fetcher, &sink, &store).await.unwrap();

    assert_eq!(report.failed_deliveries(), 1);
    assert_eq!(sink.titles(), vec!["Shipping 45", "Shipping 43", "v2.0.0"]);
    assert_eq!(store.load().await.unwrap()["blog"], json!("45"));
}

#[tokio::test]
async fn corrupt_cursor_file_aborts_before_any_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config(dir.path());
    let store = JsonFileCursorStore::new(dir.path().join(".cache.json"));
    std::fs::write(store.path(), "{ not json").unwrap();

    let fetcher = FixtureFetcher::new().with("mem://blog", BLOG_XML);
    let sink = RecordingSink::new();
    assert!(run_once(&cfg, &fetcher, &sink, &store).await.is_err());
    assert!(sink.sent().is_empty());
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{ not json");
}
