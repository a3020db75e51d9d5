//! Orchestrates scraping and validation over one shared pool
//!
//! The manager owns the cartridges, the pool and the event bus. A run moves
//! through `Idle -> Scraping -> Validating -> Ready`; in streaming mode the
//! validation workers start while cartridges are still paginating.

use crate::config::{ManagerConfig, ReadyCondition, ValidationMode};
use crate::error::{ConfigError, Error};
use crate::proxy::cartridge::{build_cartridge, check_template, CartridgeRunner, ProxyCartridge, RunnerSettings};
use crate::proxy::checker::{CheckerConfig, ProxyChecker};
use crate::proxy::events::{EventBus, ManagerState, PipelineEvent};
use crate::proxy::fetcher::ContentFetcher;
use crate::proxy::models::{CheckStatus, ProxyRecord};
use crate::proxy::pool::ProxyPool;
use crate::Result;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Totals of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Listing pages parsed across all sources
    pub total_pages: u32,
    /// Records left in the pool
    pub pooled: usize,
    /// Records that passed validation
    pub checked: usize,
    /// Records evicted by validation
    pub removed: usize,
}

/// Everything a validation worker needs, cheap to clone into tasks
#[derive(Clone)]
struct Validator {
    pool: Arc<ProxyPool>,
    checker: ProxyChecker,
    events: EventBus,
    cancel: CancellationToken,
    ready: Arc<AtomicBool>,
    ready_condition: ReadyCondition,
    claim_batch: usize,
}

impl Validator {
    /// Emit `PoolReady` unless it already went out
    fn announce_ready(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            tracing::info!(pooled = self.pool.len(), "pool ready");
            self.events.emit(PipelineEvent::PoolReady);
        }
    }

    /// Claim and probe until the pool is drained and scraping is over.
    ///
    /// Returns how many records this worker evicted.
    async fn work(self, worker: usize, mut scraping_done: watch::Receiver<bool>) -> usize {
        let mut removed = 0;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let inserted = self.pool.inserted();
            tokio::pin!(inserted);
            inserted.as_mut().enable();

            // read before claiming: once done is observed, every insert is already visible
            let done = *scraping_done.borrow_and_update();
            let batch = self.pool.claim_unchecked(self.claim_batch);
            if batch.is_empty() {
                if done {
                    break;
                }
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = &mut inserted => {}
                    changed = scraping_done.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                continue;
            }

            for record in batch {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    evicted = self.check(record) => removed += usize::from(evicted),
                }
            }
        }

        tracing::debug!(worker, removed, "validation worker finished");
        removed
    }

    /// Probe one claimed record and settle it. Returns true when it was evicted.
    async fn check(&self, record: ProxyRecord) -> bool {
        let result = self.checker.check_proxy(&record).await;
        let valid = result.is_working();

        if valid {
            self.pool
                .update_details(&record.id, result.response_time_ms, self.checker.locate(&record));
        }

        let Some(settled) = self.pool.mark_result(&record.id, valid) else {
            return false;
        };

        tracing::debug!(proxy = %settled, valid, status = ?result.status, "record checked");
        self.events.emit(PipelineEvent::RecordChecked { record: settled, valid });

        if valid && self.ready_condition == ReadyCondition::FirstChecked {
            self.announce_ready();
        }
        !valid
    }
}

/// Drives cartridges and validation workers against one pool
pub struct ProxyManager {
    config: ManagerConfig,
    cartridges: Vec<Arc<dyn ProxyCartridge>>,
    fetcher: Arc<dyn ContentFetcher>,
    pool: Arc<ProxyPool>,
    events: EventBus,
    validator: Validator,
    state: watch::Sender<ManagerState>,
    scraping_done: watch::Sender<bool>,
    started: AtomicBool,
    cancel: CancellationToken,
}

impl ProxyManager {
    /// Build a manager from the configured sources
    pub fn new(config: ManagerConfig, fetcher: Arc<dyn ContentFetcher>) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let cartridges = config
            .enabled_sources()
            .map(build_cartridge)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::with_cartridges(config, fetcher, cartridges)
    }

    /// Build a manager around cartridges constructed elsewhere. `config.sources` is not consulted.
    pub fn with_cartridges(
        config: ManagerConfig,
        fetcher: Arc<dyn ContentFetcher>,
        cartridges: Vec<Arc<dyn ProxyCartridge>>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let mut seen = HashSet::new();
        for cartridge in &cartridges {
            check_template(cartridge.as_ref())?;
            if !seen.insert(cartridge.id().to_string()) {
                return Err(ConfigError::DuplicateSource(cartridge.id().to_string()));
            }
        }
        if cartridges.is_empty() {
            tracing::warn!("no sources configured, only validation will run");
        }

        let checker_config = CheckerConfig::new()
            .with_timeout(config.timeout)
            .with_test_url(config.test_url.clone())
            .with_expect_body(config.expect_body.clone())
            .with_mmdb_path(config.mmdb_path.clone());
        let checker = ProxyChecker::new(checker_config, Arc::clone(&fetcher));

        let pool = Arc::new(ProxyPool::new());
        let events = EventBus::new();
        let cancel = CancellationToken::new();
        let validator = Validator {
            pool: Arc::clone(&pool),
            checker,
            events: events.clone(),
            cancel: cancel.clone(),
            ready: Arc::new(AtomicBool::new(false)),
            ready_condition: config.ready_condition,
            claim_batch: config.claim_batch,
        };

        let (state, _) = watch::channel(ManagerState::Idle);
        let (scraping_done, _) = watch::channel(false);

        Ok(Self {
            config,
            cartridges,
            fetcher,
            pool,
            events,
            validator,
            state,
            scraping_done,
            started: AtomicBool::new(false),
            cancel,
        })
    }

    pub fn pool(&self) -> Arc<ProxyPool> {
        Arc::clone(&self.pool)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ManagerState {
        *self.state.borrow()
    }

    /// Follow state transitions
    pub fn watch_state(&self) -> watch::Receiver<ManagerState> {
        self.state.subscribe()
    }

    pub fn mode(&self) -> ValidationMode {
        self.config.mode
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Records that passed validation, in insertion order
    pub fn checked_proxies(&self) -> Vec<ProxyRecord> {
        self.pool.checked()
    }

    /// Stop scraping and validation. Claimed records go back to NotChecked.
    pub fn shutdown(&self) {
        tracing::info!("shutdown requested");
        self.cancel.cancel();
    }

    /// Run the pipeline to Ready. A manager runs once.
    pub async fn run(&self) -> Result<RunSummary> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }

        self.set_state(ManagerState::Scraping);

        let (total_pages, removed) = if !self.config.auto_validate {
            (self.scrape().await, 0)
        } else {
            match self.config.mode {
                ValidationMode::Sequential => {
                    let pages = self.scrape().await;
                    (pages, self.validation_stage(self.scraping_done.subscribe()).await)
                }
                ValidationMode::Streaming { threshold } => {
                    let validate = async {
                        self.wait_for_pool(threshold).await;
                        self.validation_stage(self.scraping_done.subscribe()).await
                    };
                    tokio::join!(self.scrape(), validate)
                }
            }
        };

        self.finish();

        let summary = RunSummary {
            total_pages,
            pooled: self.pool.len(),
            checked: self.pool.count(CheckStatus::Checked),
            removed,
        };
        tracing::info!(
            total_pages = summary.total_pages,
            pooled = summary.pooled,
            checked = summary.checked,
            removed = summary.removed,
            "run finished"
        );
        Ok(summary)
    }

    /// Run the pipeline on a background task
    pub fn spawn(self: Arc<Self>) -> JoinHandle<Result<RunSummary>> {
        tokio::spawn(async move { self.run().await })
    }

    /// One validation stage over whatever is NotChecked now. Returns the eviction count.
    pub async fn validate(&self) -> usize {
        // nothing new arrives outside a run, so workers stop once the pool is drained
        let (_done, scraping_done) = watch::channel(true);
        let removed = self.validation_stage(scraping_done).await;
        self.finish();
        removed
    }

    /// Queue every Checked record again and validate them
    pub async fn revalidate(&self) -> usize {
        let queued = self.pool.reset_checked();
        tracing::info!(queued, "revalidating pool");
        self.validate().await
    }

    fn set_state(&self, state: ManagerState) {
        self.state.send_replace(state);
        self.events.emit(PipelineEvent::StateChanged(state));
    }

    fn finish(&self) {
        self.validator.announce_ready();
        self.set_state(ManagerState::Ready);
    }

    fn runner(&self, cartridge: &Arc<dyn ProxyCartridge>) -> CartridgeRunner {
        CartridgeRunner::new(
            Arc::clone(cartridge),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.pool),
            self.events.clone(),
            RunnerSettings {
                retry: self.config.retry,
                timeout: self.config.timeout,
            },
            self.cancel.clone(),
        )
    }

    /// Run every cartridge to completion and return the parsed page count
    async fn scrape(&self) -> u32 {
        let mut total_pages = 0;

        if self.config.concurrent_sources {
            let (sources, handles): (Vec<_>, Vec<_>) = self
                .cartridges
                .iter()
                .map(|cartridge| (cartridge.id().to_string(), tokio::spawn(self.runner(cartridge).run())))
                .unzip();
            for (source, joined) in sources.into_iter().zip(join_all(handles).await) {
                total_pages += self.settle_source(source, joined);
            }
        } else {
            for cartridge in &self.cartridges {
                let handle = tokio::spawn(self.runner(cartridge).run());
                total_pages += self.settle_source(cartridge.id().to_string(), handle.await);
            }
        }

        self.scraping_done.send_replace(true);
        tracing::info!(total_pages, pooled = self.pool.len(), "all sources completed");
        self.events.emit(PipelineEvent::AllSourcesCompleted { total_pages });
        total_pages
    }

    /// A panicked cartridge still counts as completed, with no pages
    fn settle_source(&self, source: String, joined: std::result::Result<u32, JoinError>) -> u32 {
        match joined {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "cartridge task failed");
                self.events.emit(PipelineEvent::SourceCompleted { source, total_pages: 0 });
                0
            }
        }
    }

    /// Wait until the pool holds `threshold` records, scraping ends, or shutdown
    async fn wait_for_pool(&self, threshold: usize) {
        let mut scraping_done = self.scraping_done.subscribe();

        loop {
            let inserted = self.pool.inserted();
            tokio::pin!(inserted);
            inserted.as_mut().enable();

            let done = *scraping_done.borrow_and_update();
            if done || self.pool.len() >= threshold || self.cancel.is_cancelled() {
                return;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = &mut inserted => {}
                _ = scraping_done.changed() => {}
            }
        }
    }

    async fn validation_stage(&self, scraping_done: watch::Receiver<bool>) -> usize {
        self.set_state(ManagerState::Validating);
        tracing::info!(workers = self.config.workers, pooled = self.pool.len(), "validation started");

        let handles: Vec<_> = (0..self.config.workers)
            .map(|worker| tokio::spawn(self.validator.clone().work(worker, scraping_done.clone())))
            .collect();

        let mut removed = 0;
        for joined in join_all(handles).await {
            match joined {
                Ok(evicted) => removed += evicted,
                Err(e) => tracing::warn!(error = %e, "validation worker failed"),
            }
        }

        let released = self.pool.release_claims();
        if released > 0 {
            tracing::info!(released, "released unfinished claims");
        }

        tracing::info!(removed, remaining = self.pool.len(), "validation finished");
        self.events.emit(PipelineEvent::ProxiesChecked { removed });
        removed
    }
}
