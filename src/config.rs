//! Pipeline configuration
//!
//! Everything here derives serde so an outside loader can supply it; in code
//! the `with_*` builders are the usual way in.

use crate::error::ConfigError;
use crate::proxy::cartridge::CartridgeKind;
use crate::proxy::models::ProxyType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Default number of validation workers
const DEFAULT_WORKERS: usize = 10;

/// Default attempts per page before giving up on a source
const DEFAULT_ATTEMPTS: u32 = 3;

/// Default pause between attempts in milliseconds
const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

/// Default per-fetch and per-probe timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default URL to test proxies against
const DEFAULT_TEST_URL: &str = "http://httpbin.org/ip";

/// Fixed-delay retry budget for page fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per page, the first one included
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

/// When validation workers start relative to scraping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValidationMode {
    /// Workers start after every cartridge has completed
    #[default]
    Sequential,
    /// Workers start once the pool holds `threshold` records and run alongside scraping
    Streaming { threshold: usize },
}

impl ValidationMode {
    pub fn is_streaming(&self) -> bool {
        matches!(self, ValidationMode::Streaming { .. })
    }
}

/// What makes the manager announce `PoolReady`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReadyCondition {
    /// The first record that passes validation
    FirstChecked,
    /// Scraping and validation have both finished
    #[default]
    AllStagesComplete,
}

/// One configured listing source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub kind: CartridgeKind,
    /// Overrides the cartridge's URL template
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub start_page: Option<u32>,
    #[serde(default)]
    pub max_pages: Option<u32>,
    /// Protocol assumed for sources that do not list one
    #[serde(default)]
    pub proxy_type: Option<ProxyType>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl SourceConfig {
    pub fn new(id: &str, kind: CartridgeKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            url: None,
            start_page: None,
            max_pages: None,
            proxy_type: None,
            enabled: true,
        }
    }

    /// A source using the kind's built-in id
    pub fn builtin(kind: CartridgeKind) -> Self {
        Self::new(kind.default_id(), kind)
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_start_page(mut self, page: u32) -> Self {
        self.start_page = Some(page);
        self
    }

    pub fn with_max_pages(mut self, pages: u32) -> Self {
        self.max_pages = Some(pages);
        self
    }

    pub fn with_proxy_type(mut self, proxy_type: ProxyType) -> Self {
        self.proxy_type = Some(proxy_type);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Configuration for the proxy manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub sources: Vec<SourceConfig>,
    /// Number of validation workers
    pub workers: usize,
    /// Records a worker claims at once
    pub claim_batch: usize,
    pub auto_validate: bool,
    pub mode: ValidationMode,
    pub ready_condition: ReadyCondition,
    /// Run cartridges side by side instead of one after another
    pub concurrent_sources: bool,
    pub retry: RetryPolicy,
    /// Bound on every single fetch and probe
    pub timeout: Duration,
    /// URL to test proxies against
    pub test_url: String,
    /// Probe responses must contain this text when set
    pub expect_body: Option<String>,
    /// Path to MMDB file for geolocation (optional)
    pub mmdb_path: Option<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            workers: DEFAULT_WORKERS,
            claim_batch: 1,
            auto_validate: true,
            mode: ValidationMode::default(),
            ready_condition: ReadyCondition::default(),
            concurrent_sources: true,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            test_url: DEFAULT_TEST_URL.to_string(),
            expect_body: None,
            mmdb_path: None,
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_claim_batch(mut self, batch: usize) -> Self {
        self.claim_batch = batch;
        self
    }

    pub fn with_auto_validate(mut self, auto_validate: bool) -> Self {
        self.auto_validate = auto_validate;
        self
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_ready_condition(mut self, condition: ReadyCondition) -> Self {
        self.ready_condition = condition;
        self
    }

    pub fn with_concurrent_sources(mut self, concurrent: bool) -> Self {
        self.concurrent_sources = concurrent;
        self
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry = RetryPolicy { attempts, delay };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_test_url(mut self, url: String) -> Self {
        self.test_url = url;
        self
    }

    pub fn with_expect_body(mut self, marker: String) -> Self {
        self.expect_body = Some(marker);
        self
    }

    pub fn with_mmdb_path(mut self, path: String) -> Self {
        self.mmdb_path = Some(path);
        self
    }

    /// Sources that will actually run
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|source| source.enabled)
    }

    /// Reject settings the pipeline cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.claim_batch == 0 {
            return Err(ConfigError::ZeroBatch);
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.mode == (ValidationMode::Streaming { threshold: 0 }) {
            return Err(ConfigError::ZeroThreshold);
        }

        let mut seen = HashSet::new();
        for source in self.enabled_sources() {
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::DuplicateSource(source.id.clone()));
            }
        }

        Ok(())
    }
}
