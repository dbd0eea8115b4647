// src/ingest/parser.rs
//! RSS 2.0 / RSS 1.0 / Atom documents into generic JSON trees.
//!
//! Every element becomes a key (prefix colons turned into underscores, so
//! `media:thumbnail` is reachable as `media_thumbnail`). On top of the raw keys a
//! small set of normalized keys is written so the same path expressions work for
//! both formats:
//!
//! | key              | RSS                              | Atom                          |
//! |------------------|----------------------------------|-------------------------------|
//! | `id`             | `guid`, else `link`              | `id`, else alternate link     |
//! | `title`          | `title`                          | `title`                       |
//! | `link`           | `link`                           | `link[rel=alternate]@href`    |
//! | `summary`        | `description`                    | `summary`, else `content`     |
//! | `content`        | `[{value,type}]` from `content:encoded` | `[{value,type}]` from `content` |
//! | `published`      | `pubDate` / `dc:date`            | `published` / `issued`        |
//! | `author`         | `author` / `dc:creator`          | `author/name`                 |
//! | `tags`           | `[{term}]` from `category`       | `[{term}]` from `category@term` |
//! | `media_thumbnail`| always an array of attribute maps | same                         |
//!
//! Feed metadata gets `title`, `link`, `subtitle`, `updated`, and `image.href`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::ingest::types::ParsedFeed;

/// One XML element with its attributes, text and children.
#[derive(Debug, Default)]
struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn open(e: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let attrs = e
            .attributes()
            .flatten()
            .filter_map(|a| {
                let key = String::from_utf8_lossy(a.key.as_ref()).to_string();
                if key == "xmlns" || key.starts_with("xmlns:") {
                    return None;
                }
                let value = a
                    .unescape_value()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).to_string());
                Some((key, value))
            })
            .collect();
        Self {
            name,
            attrs,
            ..Self::default()
        }
    }

    /// Element name without its namespace prefix.
    fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn text(&self) -> Option<String> {
        let t = self.text.trim();
        (!t.is_empty()).then(|| t.to_string())
    }

    /// First non-empty text among the named children.
    fn text_of(&self, names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|n| self.child(n))
            .find_map(Node::text)
    }

    fn attrs_value(&self) -> Value {
        Value::Object(
            self.attrs
                .iter()
                .map(|(k, v)| (key_for(k), Value::String(v.clone())))
                .collect(),
        )
    }

    /// Generic conversion: leaf text becomes a string, everything else a mapping.
    fn to_value(&self, skip: &[&str]) -> Value {
        if self.attrs.is_empty() && self.children.is_empty() {
            return Value::String(self.text.trim().to_string());
        }
        let mut map = Map::new();
        for (k, v) in &self.attrs {
            map.insert(key_for(k), Value::String(v.clone()));
        }
        for child in self.children.iter().filter(|c| !skip.contains(&c.name.as_str())) {
            push_value(&mut map, key_for(&child.name), child.to_value(&[]));
        }
        if let Some(text) = self.text() {
            map.insert("value".to_string(), Value::String(text));
        }
        Value::Object(map)
    }
}

fn key_for(name: &str) -> String {
    name.replace(':', "_")
}

/// Inserts `value` under `key`, turning repeated keys into an array.
fn push_value(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

fn set_opt(map: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(v) = value {
        map.insert(key.to_string(), Value::String(v));
    }
}

/// Replace HTML named entities that are not valid XML so unescaping does not choke.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "&#8211;")
        .replace("&mdash;", "&#8212;")
        .replace("&ldquo;", "&#8220;")
        .replace("&rdquo;", "&#8221;")
        .replace("&lsquo;", "&#8216;")
        .replace("&rsquo;", "&#8217;")
        .replace("&hellip;", "&#8230;")
}

fn parse_tree(xml: &str, url: &str) -> Result<Node, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = vec![Node::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(Node::open(&e)),
            Ok(Event::Empty(e)) => {
                let node = Node::open(&e);
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(FetchError::parse(url, "unbalanced closing tag"));
                }
                if let Some(node) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(node);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&e).to_string());
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FetchError::parse(
                    url,
                    format!("XML error at byte {}: {e}", reader.buffer_position()),
                ))
            }
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(FetchError::parse(url, "document ended inside an element"));
    }
    stack
        .pop()
        .and_then(|doc| doc.children.into_iter().next())
        .ok_or_else(|| FetchError::parse(url, "empty document"))
}

/// Parse an RSS or Atom document.
pub fn parse_feed(xml: &str, url: &str) -> Result<ParsedFeed, FetchError> {
    let xml = scrub_html_entities_for_xml(xml);
    let root = parse_tree(&xml, url)?;

    match root.local_name() {
        "rss" => {
            let channel = root
                .child("channel")
                .ok_or_else(|| FetchError::parse(url, "rss document without <channel>"))?;
            let entries = channel.children_named("item").map(rss_entry).collect();
            Ok(ParsedFeed::new(rss_feed(channel, &["item"]), entries))
        }
        // RSS 1.0: items are siblings of the channel
        "RDF" => {
            let channel = root
                .children
                .iter()
                .find(|c| c.local_name() == "channel")
                .ok_or_else(|| FetchError::parse(url, "rdf document without <channel>"))?;
            let entries = root
                .children
                .iter()
                .filter(|c| c.local_name() == "item")
                .map(rss_entry)
                .collect();
            Ok(ParsedFeed::new(rss_feed(channel, &["items"]), entries))
        }
        "feed" => {
            let entries = root.children_named("entry").map(atom_entry).collect();
            Ok(ParsedFeed::new(atom_feed(&root), entries))
        }
        other => Err(FetchError::parse(
            url,
            format!("unsupported root element <{other}>"),
        )),
    }
}

fn rss_feed(channel: &Node, skip: &[&str]) -> Value {
    let mut map = match channel.to_value(skip) {
        Value::Object(m) => m,
        _ => Map::new(),
    };
    set_opt(&mut map, "title", channel.text_of(&["title"]));
    set_opt(&mut map, "link", channel.text_of(&["link"]));
    set_opt(&mut map, "subtitle", channel.text_of(&["description"]));
    set_opt(&mut map, "updated", channel.text_of(&["lastBuildDate", "dc:date"]));
    set_opt(&mut map, "published", channel.text_of(&["pubDate"]));
    if let Some(image) = channel.child("image") {
        let mut img = Map::new();
        set_opt(&mut img, "href", image.text_of(&["url"]));
        set_opt(&mut img, "title", image.text_of(&["title"]));
        set_opt(&mut img, "link", image.text_of(&["link"]));
        map.insert("image".to_string(), Value::Object(img));
    }
    Value::Object(map)
}

fn rss_entry(item: &Node) -> Value {
    let mut map = match item.to_value(&[]) {
        Value::Object(m) => m,
        _ => Map::new(),
    };
    let link = item.text_of(&["link"]);
    set_opt(&mut map, "id", item.text_of(&["guid"]).or_else(|| link.clone()));
    set_opt(&mut map, "title", item.text_of(&["title"]));
    set_opt(&mut map, "link", link);
    set_opt(&mut map, "summary", item.text_of(&["description"]));
    set_opt(&mut map, "published", item.text_of(&["pubDate", "dc:date"]));
    set_opt(&mut map, "author", item.text_of(&["author", "dc:creator"]));
    if let Some(encoded) = item.text_of(&["content:encoded"]) {
        map.insert(
            "content".to_string(),
            serde_json::json!([{ "value": encoded, "type": "text/html" }]),
        );
    }
    let tags: Vec<Value> = item
        .children_named("category")
        .filter_map(Node::text)
        .map(|term| serde_json::json!({ "term": term }))
        .collect();
    if !tags.is_empty() {
        map.insert("tags".to_string(), Value::Array(tags));
    }
    let enclosures: Vec<Value> = item
        .children_named("enclosure")
        .map(|e| {
            let mut m = Map::new();
            set_opt(&mut m, "href", e.attr("url").map(str::to_string));
            set_opt(&mut m, "type", e.attr("type").map(str::to_string));
            set_opt(&mut m, "length", e.attr("length").map(str::to_string));
            Value::Object(m)
        })
        .collect();
    if !enclosures.is_empty() {
        map.insert("enclosures".to_string(), Value::Array(enclosures));
    }
    normalize_media(item, &mut map);
    Value::Object(map)
}

/// `href` of the first `rel="alternate"` (or rel-less) link.
fn atom_alternate(node: &Node) -> Option<String> {
    node.children_named("link")
        .find(|l| matches!(l.attr("rel"), None | Some("alternate")))
        .and_then(|l| l.attr("href"))
        .map(str::to_string)
}

fn atom_links(node: &Node) -> Value {
    Value::Array(node.children_named("link").map(Node::attrs_value).collect())
}

fn atom_feed(feed: &Node) -> Value {
    let mut map = match feed.to_value(&["entry"]) {
        Value::Object(m) => m,
        _ => Map::new(),
    };
    set_opt(&mut map, "id", feed.text_of(&["id"]));
    set_opt(&mut map, "title", feed.text_of(&["title"]));
    set_opt(&mut map, "link", atom_alternate(feed));
    map.insert("links".to_string(), atom_links(feed));
    set_opt(&mut map, "subtitle", feed.text_of(&["subtitle", "tagline"]));
    set_opt(&mut map, "updated", feed.text_of(&["updated", "modified"]));
    set_opt(&mut map, "author", feed.child("author").and_then(|a| a.text_of(&["name"])));
    if let Some(href) = feed.text_of(&["logo", "icon"]) {
        map.insert("image".to_string(), serde_json::json!({ "href": href }));
    }
    Value::Object(map)
}

fn atom_entry(entry: &Node) -> Value {
    let mut map = match entry.to_value(&[]) {
        Value::Object(m) => m,
        _ => Map::new(),
    };
    let link = atom_alternate(entry);
    set_opt(&mut map, "id", entry.text_of(&["id"]).or_else(|| link.clone()));
    set_opt(&mut map, "title", entry.text_of(&["title"]));
    set_opt(&mut map, "link", link);
    map.insert("links".to_string(), atom_links(entry));
    set_opt(&mut map, "summary", entry.text_of(&["summary", "content"]));
    set_opt(&mut map, "published", entry.text_of(&["published", "issued"]));
    set_opt(&mut map, "updated", entry.text_of(&["updated", "modified"]));
    set_opt(&mut map, "author", entry.child("author").and_then(|a| a.text_of(&["name"])));
    if let Some(content) = entry.child("content") {
        if let Some(value) = content.text() {
            let kind = content.attr("type").unwrap_or("text").to_string();
            map.insert(
                "content".to_string(),
                serde_json::json!([{ "value": value, "type": kind }]),
            );
        }
    }
    let tags: Vec<Value> = entry
        .children_named("category")
        .filter_map(|c| c.attr("term"))
        .map(|term| serde_json::json!({ "term": term }))
        .collect();
    if !tags.is_empty() {
        map.insert("tags".to_string(), Value::Array(tags));
    }
    normalize_media(entry, &mut map);
    Value::Object(map)
}

/// `media_thumbnail` is always a list, also when nested in `media:group`.
fn normalize_media(node: &Node, map: &mut Map<String, Value>) {
    let mut thumbs: Vec<Value> = node
        .children_named("media:thumbnail")
        .map(Node::attrs_value)
        .collect();
    if let Some(group) = node.child("media:group") {
        thumbs.extend(group.children_named("media:thumbnail").map(Node::attrs_value));
    }
    if !thumbs.is_empty() {
        map.insert("media_thumbnail".to_string(), Value::Array(thumbs));
    }
}
