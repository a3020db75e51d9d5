//! Page fetching contract and the default reqwest-backed fetcher

use crate::error::FetchError;
use crate::proxy::models::ProxyRecord;
use async_trait::async_trait;
use reqwest::{Client, Proxy as ReqwestProxy};
use std::time::Duration;

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for HTTP requests
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Fetches page content, optionally routed through a proxy.
///
/// The pipeline only talks to the network through this trait, so a headless
/// browser driver can stand in for the plain HTTP client.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str, via: Option<&ProxyRecord>) -> Result<String, FetchError>;
}

/// Plain HTTP fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    user_agent: String,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout and user agent
    pub fn new() -> Result<Self, FetchError> {
        Self::with_settings(Duration::from_secs(DEFAULT_TIMEOUT_SECS), DEFAULT_USER_AGENT)
    }

    pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|source| FetchError::Http {
                url: String::new(),
                source,
            })?;

        Ok(Self {
            client,
            timeout,
            user_agent: user_agent.to_string(),
        })
    }

    /// Build a one-off client that sends every request, http or https, through the given proxy
    fn proxied_client(&self, proxy: &ProxyRecord) -> Result<Client, FetchError> {
        let invalid = |e: reqwest::Error| FetchError::InvalidProxy {
            proxy: proxy.to_simple_string(),
            message: e.to_string(),
        };

        let reqwest_proxy = ReqwestProxy::all(proxy.connect_url()).map_err(invalid)?;

        Client::builder()
            .proxy(reqwest_proxy)
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(invalid)
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, via: Option<&ProxyRecord>) -> Result<String, FetchError> {
        let client = match via {
            Some(proxy) => self.proxied_client(proxy)?,
            None => self.client.clone(),
        };

        let classify = |source: reqwest::Error| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Http {
                    url: url.to_string(),
                    source,
                }
            }
        };

        let response = client.get(url).send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::ProxyType;

    #[test]
    fn test_http_fetcher_creation() {
        assert!(HttpFetcher::new().is_ok());
    }

    #[test]
    fn test_proxied_client_for_common_protocols() {
        let fetcher = HttpFetcher::new().unwrap();
        for proxy_type in [ProxyType::Http, ProxyType::Https, ProxyType::Socks5] {
            let proxy = ProxyRecord::new("test", "127.0.0.1".to_string(), 1080, proxy_type);
            assert!(fetcher.proxied_client(&proxy).is_ok());
        }
    }
}
