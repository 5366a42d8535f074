//! Error types for the fetch, store and config layers.

use std::path::PathBuf;

use thiserror::Error;

/// Fetching the page failed. The run ends with no data.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("bad url {url}: {source}")]
    BadUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("http status {status} from {url}")]
    Status { status: u16, url: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("remote insert failed: {0}")]
    Remote(#[from] reqwest::Error),

    #[error("remote store rejected insert with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to serialize batch: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write local batch to {path}: {source}")]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    NotPositive { name: &'static str, value: String },

    #[error("{name} is too large to express in seconds, got {value:?}")]
    IntervalTooLarge { name: &'static str, value: String },

    #[error("{name} is not a valid port: {value:?}")]
    BadPort { name: &'static str, value: String },

    #[error("{name} is not a valid url: {value:?}")]
    BadUrl { name: &'static str, value: String },

    #[error("{name} is not a valid css selector: {value:?}")]
    BadSelector { name: &'static str, value: String },
}

pub type StoreResult<T> = Result<T, StoreError>;
