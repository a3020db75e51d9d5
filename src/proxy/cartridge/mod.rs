//! Source cartridges: one per proxy listing site
//!
//! A cartridge knows three things about its site: how page numbers map to
//! URLs, what a real listing page looks like, and how to turn its rows into
//! records. Fetching, retrying and pool insertion live in [`CartridgeRunner`].

mod free_proxy_list;
mod plain_text;
mod prem_proxy;
mod proxy_list_plus;
mod runner;

pub use free_proxy_list::FreeProxyList;
pub use plain_text::PlainText;
pub use prem_proxy::PremProxy;
pub use proxy_list_plus::ProxyListPlus;
pub use runner::{CartridgeRunner, RunnerSettings};

use crate::config::SourceConfig;
use crate::error::{ConfigError, RowError};
use crate::proxy::models::{ProxyRecord, ProxyType};
use crate::proxy::page::PageInstruction;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// Per-site scraping rules
pub trait ProxyCartridge: Send + Sync {
    /// Unique source id, stamped on every record
    fn id(&self) -> &str;

    /// URL scheme and start page
    fn pages(&self) -> &PageInstruction;

    /// Hard bound on the number of pages to fetch
    fn max_pages(&self) -> Option<u32> {
        None
    }

    /// Whether the content is a listing page this cartridge understands
    fn validate_page(&self, content: &str) -> bool;

    /// Extract every well-formed row. Malformed rows are skipped.
    fn parse_page(&self, content: &str) -> Vec<ProxyRecord>;
}

/// Built-in cartridge variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CartridgeKind {
    ProxyListPlus,
    PremProxy,
    FreeProxyList,
    PlainText,
}

impl CartridgeKind {
    pub fn all() -> &'static [CartridgeKind] {
        &[
            CartridgeKind::ProxyListPlus,
            CartridgeKind::PremProxy,
            CartridgeKind::FreeProxyList,
            CartridgeKind::PlainText,
        ]
    }

    pub fn default_id(&self) -> &'static str {
        match self {
            CartridgeKind::ProxyListPlus => "proxylistplus",
            CartridgeKind::PremProxy => "premproxy",
            CartridgeKind::FreeProxyList => "free-proxy-list",
            CartridgeKind::PlainText => "plain-text",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.default_id().eq_ignore_ascii_case(name.trim()))
    }

    /// Default URL template, `None` when the kind needs one configured
    pub fn default_template(&self) -> Option<&'static str> {
        match self {
            CartridgeKind::ProxyListPlus => Some(proxy_list_plus::TEMPLATE),
            CartridgeKind::PremProxy => Some(prem_proxy::TEMPLATE),
            CartridgeKind::FreeProxyList => Some(free_proxy_list::URL),
            CartridgeKind::PlainText => None,
        }
    }
}

/// Build the cartridge a source configuration describes
pub fn build_cartridge(source: &SourceConfig) -> Result<Arc<dyn ProxyCartridge>, ConfigError> {
    let id = source.id.as_str();
    let cartridge: Arc<dyn ProxyCartridge> = match source.kind {
        CartridgeKind::ProxyListPlus => Arc::new(ProxyListPlus::new(id)),
        CartridgeKind::PremProxy => Arc::new(PremProxy::new(id)),
        CartridgeKind::FreeProxyList => Arc::new(FreeProxyList::new(id)),
        CartridgeKind::PlainText => {
            let url = source
                .url
                .as_deref()
                .filter(|url| !url.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingUrl(source.id.clone()))?;
            Arc::new(PlainText::new(id, url, source.proxy_type.unwrap_or_default()))
        }
    };

    if source.url.is_none() && source.start_page.is_none() && source.max_pages.is_none() {
        return Ok(cartridge);
    }

    let mut pages = cartridge.pages().clone();
    if let Some(url) = &source.url {
        pages = pages.with_template(url);
    }
    if let Some(start) = source.start_page {
        pages = pages.with_start_page(start);
    }

    Ok(Arc::new(Configured {
        inner: cartridge,
        pages,
        max_pages: source.max_pages,
    }))
}

/// Check that a cartridge's first page URL parses
pub fn check_template(cartridge: &dyn ProxyCartridge) -> Result<(), ConfigError> {
    let pages = cartridge.pages();
    let url = pages.format(pages.start_page);
    url::Url::parse(&url).map_err(|_| ConfigError::InvalidTemplate {
        source_id: cartridge.id().to_string(),
        url,
    })?;
    Ok(())
}

/// A built-in cartridge with configuration overrides applied
struct Configured {
    inner: Arc<dyn ProxyCartridge>,
    pages: PageInstruction,
    max_pages: Option<u32>,
}

impl ProxyCartridge for Configured {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn pages(&self) -> &PageInstruction {
        &self.pages
    }

    fn max_pages(&self) -> Option<u32> {
        self.max_pages.or_else(|| self.inner.max_pages())
    }

    fn validate_page(&self, content: &str) -> bool {
        self.inner.validate_page(content)
    }

    fn parse_page(&self, content: &str) -> Vec<ProxyRecord> {
        self.inner.parse_page(content)
    }
}

/// Relative "N units ago" timestamps
static RELATIVE_TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(sec|second|min|minute|hour|hr|day)s?\b").expect("Invalid relative time regex")
});

/// Absolute timestamp layouts seen on listing sites
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%b-%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("Invalid selector {css}: {e:?}"))
}

/// Text of an element with inner whitespace collapsed
pub(crate) fn cell_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn parse_host(text: &str) -> Result<String, RowError> {
    let text = text.trim();
    text.parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| RowError::BadAddress(text.to_string()))
}

pub(crate) fn parse_port(text: &str) -> Result<u16, RowError> {
    let text = text.trim();
    match text.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(RowError::BadPort(text.to_string())),
    }
}

/// Split an "ip:port" cell
pub(crate) fn parse_address(text: &str) -> Result<(String, u16), RowError> {
    let text = text.trim();
    let (host, port) = text
        .rsplit_once(':')
        .ok_or_else(|| RowError::BadAddress(text.to_string()))?;
    Ok((parse_host(host)?, parse_port(port)?))
}

/// Best-effort timestamp parsing; unrecognized text means "now"
pub(crate) fn parse_timestamp(text: &str) -> DateTime<Utc> {
    parse_timestamp_at(text, Utc::now())
}

fn parse_timestamp_at(text: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let text = text.trim();

    if let Some(caps) = RELATIVE_TIME_REGEX.captures(text) {
        let amount: i64 = caps[1].parse().unwrap_or(0);
        let unit = caps[2].to_lowercase();
        let elapsed = match unit.as_str() {
            "sec" | "second" => ChronoDuration::try_seconds(amount),
            "min" | "minute" => ChronoDuration::try_minutes(amount),
            "hour" | "hr" => ChronoDuration::try_hours(amount),
            _ => ChronoDuration::try_days(amount),
        };
        // absurd ages fall back to now like any other unreadable cell
        return elapsed.and_then(|elapsed| now.checked_sub_signed(elapsed)).unwrap_or(now);
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
        .unwrap_or(now)
}

/// Protocol from a site's "Https: yes/no" column
pub(crate) fn https_flag(text: &str, default: ProxyType) -> ProxyType {
    match text.trim().to_lowercase().as_str() {
        "yes" | "+" | "true" => ProxyType::Https,
        "no" | "-" | "false" => ProxyType::Http,
        other => ProxyType::from_label(other).unwrap_or(default),
    }
}

/// Keep the good rows, log the bad ones
pub(crate) fn collect_rows<I>(source: &str, rows: I) -> Vec<ProxyRecord>
where
    I: IntoIterator<Item = Result<ProxyRecord, RowError>>,
{
    rows.into_iter()
        .filter_map(|row| match row {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(source, error = %e, "skipping row");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("10.0.0.1:3128").unwrap(), ("10.0.0.1".to_string(), 3128));
        assert!(matches!(parse_address("10.0.0.1"), Err(RowError::BadAddress(_))));
        assert!(matches!(parse_address("999.1.1.1:80"), Err(RowError::BadAddress(_))));
        assert!(matches!(parse_address("10.0.0.1:0"), Err(RowError::BadPort(_))));
        assert!(matches!(parse_address("10.0.0.1:99999"), Err(RowError::BadPort(_))));
    }

    #[test]
    fn test_relative_timestamps() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(
            parse_timestamp_at("5 minutes ago", now),
            now - ChronoDuration::minutes(5)
        );
        assert_eq!(parse_timestamp_at("2 hours ago", now), now - ChronoDuration::hours(2));
        assert_eq!(parse_timestamp_at("30 secs ago", now), now - ChronoDuration::seconds(30));
    }

    #[test]
    fn test_absolute_timestamps() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(
            parse_timestamp_at("2024-04-30 08:15:00", now),
            Utc.with_ymd_and_hms(2024, 4, 30, 8, 15, 0).unwrap()
        );
        assert_eq!(
            parse_timestamp_at("30-Apr-2024 08:15", now),
            Utc.with_ymd_and_hms(2024, 4, 30, 8, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_unparseable_timestamp_falls_back_to_now() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp_at("whenever", now), now);
        assert_eq!(parse_timestamp_at("", now), now);
    }

    #[test]
    fn test_out_of_range_age_falls_back_to_now() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp_at("9999999999 days ago", now), now);
        assert_eq!(parse_timestamp_at("99999999999999 hours ago", now), now);
        assert_eq!(parse_timestamp_at("999999999999999999999 secs ago", now), now);
    }

    #[test]
    fn test_https_flag() {
        assert_eq!(https_flag("yes", ProxyType::Http), ProxyType::Https);
        assert_eq!(https_flag("no", ProxyType::Https), ProxyType::Http);
        assert_eq!(https_flag("SOCKS5", ProxyType::Http), ProxyType::Socks5);
        assert_eq!(https_flag("?", ProxyType::Socks4), ProxyType::Socks4);
    }

    #[test]
    fn test_kind_names() {
        for kind in CartridgeKind::all() {
            assert_eq!(CartridgeKind::from_name(kind.default_id()), Some(*kind));
        }
        assert_eq!(CartridgeKind::from_name("PremProxy"), Some(CartridgeKind::PremProxy));
        assert_eq!(CartridgeKind::from_name("nope"), None);
    }

    #[test]
    fn test_build_applies_overrides() {
        let source = SourceConfig::builtin(CartridgeKind::PremProxy)
            .with_url("http://mirror.local/{PAGENO}.htm")
            .with_start_page(3)
            .with_max_pages(2);
        let cartridge = build_cartridge(&source).unwrap();
        assert_eq!(cartridge.id(), "premproxy");
        assert_eq!(cartridge.pages().format(3), "http://mirror.local/03.htm");
        assert_eq!(cartridge.pages().start_page, 3);
        assert_eq!(cartridge.max_pages(), Some(2));
    }

    #[test]
    fn test_plain_text_requires_url() {
        let source = SourceConfig::new("list", CartridgeKind::PlainText);
        assert!(matches!(
            build_cartridge(&source),
            Err(ConfigError::MissingUrl(id)) if id == "list"
        ));
    }

    #[test]
    fn test_check_template() {
        let good = build_cartridge(&SourceConfig::builtin(CartridgeKind::ProxyListPlus)).unwrap();
        assert!(check_template(good.as_ref()).is_ok());

        let bad = build_cartridge(
            &SourceConfig::builtin(CartridgeKind::ProxyListPlus).with_url("not a url {PAGENO}"),
        )
        .unwrap();
        assert!(matches!(
            check_template(bad.as_ref()),
            Err(ConfigError::InvalidTemplate { .. })
        ));
    }
}
