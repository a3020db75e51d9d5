//! Error types for the harvesting pipeline

use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Manager already started")]
    AlreadyStarted,
}

/// Configuration errors, reported before the pipeline starts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("claim batch size must be at least 1")]
    ZeroBatch,

    #[error("retry budget must allow at least one attempt")]
    ZeroAttempts,

    #[error("streaming threshold must be at least 1")]
    ZeroThreshold,

    #[error("duplicate source id: {0}")]
    DuplicateSource(String),

    #[error("source {source_id} produces an invalid URL: {url}")]
    InvalidTemplate { source_id: String, url: String },

    #[error("source {0} has no URL")]
    MissingUrl(String),
}

/// Errors returned by a content fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Invalid proxy {proxy}: {message}")]
    InvalidProxy { proxy: String, message: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    /// Whether another attempt at the same URL could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request() || source.is_body()
            }
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Timeout { .. } => true,
            FetchError::Transport { .. } => true,
            FetchError::InvalidProxy { .. } => false,
        }
    }
}

/// Reasons a single table row could not become a proxy record
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("row has no {0} column")]
    MissingColumn(&'static str),

    #[error("malformed address: {0}")]
    BadAddress(String),

    #[error("malformed port: {0}")]
    BadPort(String),
}
