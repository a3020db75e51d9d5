//! Typed pipeline events delivered over a broadcast channel

use crate::proxy::models::ProxyRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffer size of the event channel
const EVENT_CAPACITY: usize = 1024;

/// Lifecycle state of the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagerState {
    Idle,
    Scraping,
    Validating,
    Ready,
}

/// Events emitted as the pipeline progresses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// About to fetch a listing page
    ReadingPage { source: String, url: String, page: u32 },

    /// A listing page was parsed
    PageParsed {
        source: String,
        url: String,
        /// Records extracted from the page, duplicates included
        records: Vec<ProxyRecord>,
        /// How many of them were new to the pool
        inserted: usize,
    },

    /// A source stopped paginating
    SourceCompleted { source: String, total_pages: u32 },

    /// Every source has stopped paginating
    AllSourcesCompleted { total_pages: u32 },

    /// One record finished validation
    RecordChecked { record: ProxyRecord, valid: bool },

    /// A validation stage finished
    ProxiesChecked { removed: usize },

    /// The pool can be consumed
    PoolReady,

    StateChanged(ManagerState),
}

/// Cloneable sending half shared by every pipeline stage
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Send to all current subscribers. Without subscribers the event is dropped.
    pub fn emit(&self, event: PipelineEvent) {
        self.tx.send(event).ok();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_every_subscriber_in_order() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(PipelineEvent::ProxiesChecked { removed: 2 });
        bus.emit(PipelineEvent::PoolReady);

        for rx in [&mut first, &mut second] {
            assert!(matches!(
                rx.recv().await.unwrap(),
                PipelineEvent::ProxiesChecked { removed: 2 }
            ));
            assert!(matches!(rx.recv().await.unwrap(), PipelineEvent::PoolReady));
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new();
        bus.emit(PipelineEvent::PoolReady);
    }
}
