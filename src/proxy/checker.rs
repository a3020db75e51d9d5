//! Proxy checker module for checking proxy validity

use crate::proxy::fetcher::ContentFetcher;
use crate::proxy::geo::GeoLocator;
use crate::proxy::models::{GeoFields, ProxyCheckResult, ProxyRecord};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default timeout for proxy checks in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default URL to test proxies against
const DEFAULT_TEST_URL: &str = "http://httpbin.org/ip";

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each proxy check
    pub timeout: Duration,
    /// URL to test proxies against
    pub test_url: String,
    /// Text the test response must contain
    pub expect_body: Option<String>,
    /// Path to MMDB file for geolocation (optional)
    pub mmdb_path: Option<String>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            test_url: DEFAULT_TEST_URL.to_string(),
            expect_body: None,
            mmdb_path: None,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_test_url(mut self, url: String) -> Self {
        self.test_url = url;
        self
    }

    pub fn with_expect_body(mut self, marker: Option<String>) -> Self {
        self.expect_body = marker;
        self
    }

    pub fn with_mmdb_path(mut self, path: Option<String>) -> Self {
        self.mmdb_path = path;
        self
    }
}

/// Probes a proxy by fetching the test URL through it
#[derive(Clone)]
pub struct ProxyChecker {
    config: CheckerConfig,
    fetcher: Arc<dyn ContentFetcher>,
    geo_locator: Option<GeoLocator>,
}

impl ProxyChecker {
    pub fn new(config: CheckerConfig, fetcher: Arc<dyn ContentFetcher>) -> Self {
        let geo_locator = config.mmdb_path.as_ref().and_then(|path| match GeoLocator::from_path(path) {
            Ok(locator) => Some(locator),
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "geolocation disabled");
                None
            }
        });

        Self {
            config,
            fetcher,
            geo_locator,
        }
    }

    /// Check a single proxy
    pub async fn check_proxy(&self, proxy: &ProxyRecord) -> ProxyCheckResult {
        let start = Instant::now();

        match tokio::time::timeout(
            self.config.timeout,
            self.fetcher.fetch(&self.config.test_url, Some(proxy)),
        )
        .await
        {
            Ok(Ok(body)) => match &self.config.expect_body {
                Some(marker) if !body.contains(marker.as_str()) => {
                    ProxyCheckResult::failed(proxy.id, "unexpected response body".to_string())
                }
                _ => ProxyCheckResult::working(proxy.id, start.elapsed().as_millis() as u64),
            },
            Ok(Err(e)) => ProxyCheckResult::failed(proxy.id, e.to_string()),
            Err(_) => ProxyCheckResult::timeout(proxy.id),
        }
    }

    /// Location for a proxy the listing could not place
    pub fn locate(&self, proxy: &ProxyRecord) -> Option<GeoFields> {
        if !proxy.geo.is_unknown() {
            return None;
        }
        let geo = self.geo_locator.as_ref()?;
        match geo.lookup(&proxy.host) {
            Ok(location) if !location.is_empty() => Some(location.into()),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(host = %proxy.host, error = %e, "geo lookup failed");
                None
            }
        }
    }
}
