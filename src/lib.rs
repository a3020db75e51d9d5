//! Proxy Harvester - Proxy Scraper and Validator
//!
//! Scrapes free proxy listing sites page by page, deduplicates the results
//! in a shared pool and validates them through a concurrent worker pool.

pub mod config;
pub mod error;
pub mod proxy;

pub use config::{ManagerConfig, ReadyCondition, RetryPolicy, SourceConfig, ValidationMode};
pub use error::{ConfigError, Error, FetchError, RowError};
pub use proxy::*;

/// Library result type
pub type Result<T> = std::result::Result<T, Error>;
