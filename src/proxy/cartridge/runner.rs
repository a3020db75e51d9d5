//! Pagination loop that drives one cartridge

use super::ProxyCartridge;
use crate::config::RetryPolicy;
use crate::error::FetchError;
use crate::proxy::events::{EventBus, PipelineEvent};
use crate::proxy::fetcher::ContentFetcher;
use crate::proxy::pool::ProxyPool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fetch behaviour shared by every runner of a manager
#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    pub retry: RetryPolicy,
    /// Bound on a single fetch attempt
    pub timeout: Duration,
}

/// Walks one source page by page, feeding the shared pool
pub struct CartridgeRunner {
    cartridge: Arc<dyn ProxyCartridge>,
    fetcher: Arc<dyn ContentFetcher>,
    pool: Arc<ProxyPool>,
    events: EventBus,
    settings: RunnerSettings,
    cancel: CancellationToken,
    cursor: u32,
}

impl CartridgeRunner {
    pub fn new(
        cartridge: Arc<dyn ProxyCartridge>,
        fetcher: Arc<dyn ContentFetcher>,
        pool: Arc<ProxyPool>,
        events: EventBus,
        settings: RunnerSettings,
        cancel: CancellationToken,
    ) -> Self {
        let cursor = cartridge.pages().start_page;
        Self {
            cartridge,
            fetcher,
            pool,
            events,
            settings,
            cancel,
            cursor,
        }
    }

    #[cfg(test)]
    fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Paginate until the listing ends, a page cannot be fetched, or shutdown.
    ///
    /// Returns the number of pages parsed. Always emits `SourceCompleted`.
    pub async fn run(mut self) -> u32 {
        let source = self.cartridge.id().to_string();
        let pages = self.cartridge.pages().clone();
        let limit = self
            .cartridge
            .max_pages()
            .or_else(|| (!pages.is_paginated()).then_some(1));
        let mut total_pages = 0u32;

        tracing::info!(source = %source, start_page = self.cursor, "source started");

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(source = %source, "source cancelled");
                break;
            }
            if limit.is_some_and(|max| total_pages >= max) {
                break;
            }

            let url = pages.format(self.cursor);
            self.events.emit(PipelineEvent::ReadingPage {
                source: source.clone(),
                url: url.clone(),
                page: self.cursor,
            });

            let Some(content) = self.fetch_with_retry(&url).await else {
                break;
            };

            if !self.cartridge.validate_page(&content) {
                tracing::info!(source = %source, url = %url, "end of listing");
                break;
            }

            let records = self.cartridge.parse_page(&content);
            let inserted = records
                .iter()
                .filter(|record| self.pool.insert((*record).clone()))
                .count();
            tracing::debug!(
                source = %source,
                url = %url,
                parsed = records.len(),
                inserted,
                "page parsed"
            );
            self.events.emit(PipelineEvent::PageParsed {
                source: source.clone(),
                url,
                records,
                inserted,
            });

            total_pages += 1;
            match self.cursor.checked_add(1) {
                Some(next) => self.cursor = next,
                None => break,
            }
        }

        tracing::info!(source = %source, total_pages, "source completed");
        self.events.emit(PipelineEvent::SourceCompleted { source, total_pages });
        total_pages
    }

    /// One page, retried on transient failures. `None` ends pagination.
    async fn fetch_with_retry(&self, url: &str) -> Option<String> {
        let attempts = self.settings.retry.attempts.max(1);

        for attempt in 1..=attempts {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                result = tokio::time::timeout(self.settings.timeout, self.fetcher.fetch(url, None)) => result,
            };

            let error = match result {
                Ok(Ok(content)) => return Some(content),
                Ok(Err(e)) => e,
                Err(_) => FetchError::Timeout {
                    url: url.to_string(),
                },
            };

            if !error.is_retryable() {
                tracing::warn!(source = self.cartridge.id(), error = %error, "fetch failed permanently");
                return None;
            }
            if attempt == attempts {
                tracing::warn!(source = self.cartridge.id(), error = %error, attempts, "retries exhausted");
                return None;
            }

            tracing::debug!(source = self.cartridge.id(), error = %error, attempt, "fetch failed, retrying");
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.settings.retry.delay) => {}
            }
        }

        None
    }
}
