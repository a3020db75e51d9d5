//! Proxy module for harvesting and validating proxies
//!
//! This module provides functionality for:
//! - Paginating proxy listing sites through pluggable cartridges
//! - Parsing proxies from HTML tables and line-oriented text
//! - Deduplicating them in a shared pool
//! - Validating pooled proxies with a worker pool

pub mod cartridge;
pub mod checker;
pub mod country;
pub mod events;
pub mod fetcher;
pub mod geo;
pub mod manager;
pub mod models;
pub mod page;
pub mod parser;
pub mod pool;

pub use cartridge::{CartridgeKind, ProxyCartridge};
pub use checker::{CheckerConfig, ProxyChecker};
pub use events::{EventBus, ManagerState, PipelineEvent};
pub use fetcher::{ContentFetcher, HttpFetcher};
pub use geo::{GeoLocation, GeoLocator};
pub use manager::{ProxyManager, RunSummary};
pub use models::{
    Anonymity, CheckStatus, GeoFields, ProxyAuth, ProxyCheckResult, ProxyCheckStatus, ProxyId, ProxyRecord, ProxyType,
};
pub use page::{PadDirection, PageInstruction};
pub use parser::ProxyParser;
pub use pool::ProxyPool;
