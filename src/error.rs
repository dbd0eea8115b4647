// src/error.rs
//! Error taxonomy for a feed relay run.
//!
//! Each kind maps to a different blast radius:
//! - [`ConfigError`] aborts the run before any source is touched.
//! - [`FetchError`] is isolated to one source, which is skipped for this run.
//! - [`DeliveryError`] is isolated to one entry; the run keeps going.
//! - [`PersistError`] fails the run outcome but never leaves a half-written cursor file.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for orchestrator-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Missing or malformed configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// A source's feed could not be retrieved or parsed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot read feed file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse feed {url}: {message}")]
    Parse { url: String, message: String },
}

impl FetchError {
    pub fn parse(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

/// The sink rejected or failed to deliver one notification.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("webhook answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// The cursor store could not be read or written.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("cursor store I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cursor store {path} is not a valid cursor map: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode cursor map: {0}")]
    Encode(#[from] serde_json::Error),
}

impl PersistError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Run-level error: only the kinds that can abort a whole run.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}
