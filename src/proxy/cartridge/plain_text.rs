//! Raw text proxy lists (one proxy per line, or addresses embedded in markup)

use super::{parse_address, parse_host, ProxyCartridge};
use crate::proxy::models::{ProxyRecord, ProxyType};
use crate::proxy::page::PageInstruction;
use crate::proxy::parser::ProxyParser;
use once_cell::sync::Lazy;
use regex::Regex;

/// Regex pattern to match IP:PORT patterns in text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})\b").expect("Invalid IP:PORT regex")
});

pub struct PlainText {
    id: String,
    pages: PageInstruction,
    proxy_type: ProxyType,
}

impl PlainText {
    pub fn new(id: &str, url: &str, proxy_type: ProxyType) -> Self {
        let pages = if url.contains(crate::proxy::page::PAGE_PLACEHOLDER) {
            PageInstruction::new(url)
        } else {
            PageInstruction::single(url)
        };

        Self {
            id: id.to_string(),
            pages,
            proxy_type,
        }
    }

    /// Line-by-line parsing first, regex extraction when no line parses
    fn extract(&self, content: &str) -> Vec<ProxyRecord> {
        let proxies: Vec<ProxyRecord> = ProxyParser::parse_string(content, &self.id, self.proxy_type)
            .into_iter()
            .filter_map(|mut record| match parse_host(&record.host) {
                Ok(host) => {
                    record.host = host;
                    Some(record)
                }
                Err(e) => {
                    tracing::debug!(source = %self.id, error = %e, "skipping line");
                    None
                }
            })
            .collect();
        if !proxies.is_empty() {
            return proxies;
        }

        IP_PORT_REGEX
            .find_iter(content)
            .filter_map(|m| match parse_address(m.as_str()) {
                Ok((host, port)) => Some(ProxyRecord::new(&self.id, host, port, self.proxy_type)),
                Err(e) => {
                    tracing::debug!(source = %self.id, error = %e, "skipping match");
                    None
                }
            })
            .collect()
    }
}

impl ProxyCartridge for PlainText {
    fn id(&self) -> &str {
        &self.id
    }

    fn pages(&self) -> &PageInstruction {
        &self.pages
    }

    fn max_pages(&self) -> Option<u32> {
        (!self.pages.is_paginated()).then_some(1)
    }

    fn validate_page(&self, content: &str) -> bool {
        !self.extract(content).is_empty()
    }

    fn parse_page(&self, content: &str) -> Vec<ProxyRecord> {
        self.extract(content)
    }
}
