// src/config.rs
//! Relay configuration: webhook destination, watched sources and their field mappings.
//!
//! ```yaml
//! webhook: https://discord.com/api/webhooks/...
//! sources:
//!   blog:
//!     feed: https://example.com/feed.xml
//!     id: $entry.link            # optional, defaults to "id"
//!     embed:
//!       title: $entry.title
//!       url: $entry.link
//!       body: $entry.summary
//!       colour: 16711680
//!       thumbnail: $feed.image.href
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

pub const ENV_CONFIG_PATH: &str = "FEEDHOOK_CONFIG_PATH";
pub const ENV_CACHE_PATH: &str = "FEEDHOOK_CACHE_PATH";

pub const DEFAULT_CACHE_PATH: &str = ".cache.json";
const DEFAULT_CONFIG_CANDIDATES: [&str; 4] =
    ["config.yaml", "config.yml", "config.toml", "config.json"];

fn default_id_field() -> Value {
    Value::String("id".to_string())
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_max_retries() -> u8 {
    3
}

/// Order in which one source's new entries are handed to the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOrder {
    /// Scan order: newest entry first.
    #[default]
    NewestFirst,
    /// Chronological: oldest new entry first.
    OldestFirst,
}

/// Field mapping used to build one notification. Each value is a literal or a `$` path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedFields {
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub url: Option<Value>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub colour: Option<Value>,
    #[serde(default)]
    pub color: Option<Value>,
    #[serde(default)]
    pub thumbnail: Option<Value>,
}

impl EmbedFields {
    /// British spelling wins when both are set.
    pub fn colour(&self) -> Option<&Value> {
        self.colour.as_ref().or(self.color.as_ref())
    }
}

/// One watched feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique key, taken from the `sources` map key.
    #[serde(skip)]
    pub name: String,
    pub feed: String,
    #[serde(default = "default_id_field")]
    pub id: Value,
    #[serde(default)]
    pub embed: EmbedFields,
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, feed: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feed: feed.into(),
            id: default_id_field(),
            embed: EmbedFields::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_embed(mut self, embed: EmbedFields) -> Self {
        self.embed = embed;
        self
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    pub webhook: String,
    /// Sources in document order.
    #[serde(deserialize_with = "sources_in_order")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub delivery_order: DeliveryOrder,
    /// Upper bound on notifications per source per run; unbounded when unset.
    #[serde(default)]
    pub max_deliveries: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
}

impl Config {
    /// Load from an explicit path. Format follows the extension; YAML when unknown.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = Self::parse(&content, &ext).map_err(|e| ConfigError::parse(path, e))?;
        cfg.validate()?;
        tracing::debug!(path = %path.display(), sources = cfg.sources.len(), "config loaded");
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $FEEDHOOK_CONFIG_PATH
    /// 2) ./config.yaml, ./config.yml, ./config.toml, ./config.json
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_from(&resolve_config_path()?)
    }

    fn parse(s: &str, hint_ext: &str) -> Result<Self, String> {
        match hint_ext {
            "toml" => toml::from_str(s).map_err(|e| e.to_string()),
            "json" => serde_json::from_str(s).map_err(|e| e.to_string()),
            _ => serde_yml::from_str(s).map_err(|e| e.to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook.trim().is_empty() {
            return Err(ConfigError::invalid("`webhook` must not be empty"));
        }
        if self.max_deliveries == Some(0) {
            return Err(ConfigError::invalid("`max_deliveries` must be at least 1"));
        }
        for src in &self.sources {
            if src.feed.trim().is_empty() {
                return Err(ConfigError::invalid(format!(
                    "source `{}` has an empty `feed`",
                    src.name
                )));
            }
        }
        Ok(())
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// Config path from `$FEEDHOOK_CONFIG_PATH`, else the first default candidate that exists.
pub fn resolve_config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        return if pb.exists() {
            Ok(pb)
        } else {
            Err(ConfigError::invalid(format!(
                "{ENV_CONFIG_PATH} points to non-existent path {}",
                pb.display()
            )))
        };
    }
    DEFAULT_CONFIG_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| ConfigError::invalid("no config.yaml found in the working directory"))
}

/// Cursor file path from `$FEEDHOOK_CACHE_PATH`, else `.cache.json`.
pub fn resolve_cache_path() -> PathBuf {
    std::env::var(ENV_CACHE_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_PATH))
}

fn sources_in_order<'de, D>(deserializer: D) -> Result<Vec<SourceConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    struct SourcesVisitor;

    impl<'de> Visitor<'de> for SourcesVisitor {
        type Value = Vec<SourceConfig>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping of source name to source settings")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out: Vec<SourceConfig> = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, mut src)) = map.next_entry::<String, SourceConfig>()? {
                if out.iter().any(|s| s.name == name) {
                    return Err(de::Error::custom(format!("duplicate source `{name}`")));
                }
                src.name = name;
                out.push(src);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(SourcesVisitor)
}
