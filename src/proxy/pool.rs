//! The shared, deduplicated proxy bucket
//!
//! Every cartridge writes into the pool and every validation worker claims
//! from it. All access goes through a single mutex so the (host, port) index
//! and the status field can never disagree.

use crate::proxy::models::{CheckStatus, GeoFields, ProxyId, ProxyRecord};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct PoolInner {
    /// id -> (insertion sequence, record)
    records: HashMap<ProxyId, (u64, ProxyRecord)>,
    by_address: HashMap<(String, u16), ProxyId>,
    next_seq: u64,
}

impl PoolInner {
    fn ordered(&self) -> Vec<&ProxyRecord> {
        let mut entries: Vec<&(u64, ProxyRecord)> = self.records.values().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, record)| record).collect()
    }

    fn remove(&mut self, id: &ProxyId) -> Option<ProxyRecord> {
        let (_, record) = self.records.remove(id)?;
        self.by_address.remove(&record.key());
        Some(record)
    }
}

/// Thread-safe proxy store keyed by (host, port)
#[derive(Debug, Default)]
pub struct ProxyPool {
    inner: Mutex<PoolInner>,
    inserted: Notify,
}

impl ProxyPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        // no mutation below can panic halfway, so a poisoned guard is still consistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a record as NotChecked. Returns false when its address is already pooled.
    pub fn insert(&self, mut record: ProxyRecord) -> bool {
        {
            let mut inner = self.lock();
            let key = record.key();
            if inner.by_address.contains_key(&key) {
                return false;
            }

            record.status = CheckStatus::NotChecked;
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.by_address.insert(key, record.id);
            inner.records.insert(record.id, (seq, record));
        }

        self.inserted.notify_waiters();
        true
    }

    /// Atomically move up to `max` NotChecked records to Checking and return them
    pub fn claim_unchecked(&self, max: usize) -> Vec<ProxyRecord> {
        let mut inner = self.lock();
        let mut candidates: Vec<(u64, ProxyId)> = inner
            .records
            .values()
            .filter(|(_, record)| record.status == CheckStatus::NotChecked)
            .map(|(seq, record)| (*seq, record.id))
            .collect();
        candidates.sort_unstable();

        candidates
            .into_iter()
            .take(max)
            .filter_map(|(_, id)| {
                let (_, record) = inner.records.get_mut(&id)?;
                record.status = CheckStatus::Checking;
                Some(record.clone())
            })
            .collect()
    }

    /// Settle a claimed record: Checked when valid, evicted otherwise.
    ///
    /// Returns the settled record, or `None` if the id is unknown or was not claimed.
    pub fn mark_result(&self, id: &ProxyId, valid: bool) -> Option<ProxyRecord> {
        let mut inner = self.lock();
        let (_, record) = inner.records.get_mut(id)?;
        if record.status != CheckStatus::Checking {
            return None;
        }

        record.last_checked = Utc::now();
        if valid {
            record.status = CheckStatus::Checked;
            return Some(record.clone());
        }

        let mut evicted = inner.remove(id)?;
        evicted.status = CheckStatus::CheckedInvalid;
        Some(evicted)
    }

    /// Record probe latency and fill unknown geo fields of a pooled record
    pub fn update_details(&self, id: &ProxyId, latency_ms: Option<u64>, geo: Option<GeoFields>) {
        let mut inner = self.lock();
        if let Some((_, record)) = inner.records.get_mut(id) {
            if latency_ms.is_some() {
                record.latency_ms = latency_ms;
            }
            if let Some(geo) = geo {
                if record.geo.is_unknown() {
                    record.geo = geo;
                }
            }
        }
    }

    /// Insertion-ordered copies of the records matching `predicate`
    pub fn snapshot<F>(&self, predicate: F) -> Vec<ProxyRecord>
    where
        F: Fn(&ProxyRecord) -> bool,
    {
        self.lock()
            .ordered()
            .into_iter()
            .filter(|record| predicate(*record))
            .cloned()
            .collect()
    }

    /// All records that passed validation
    pub fn checked(&self) -> Vec<ProxyRecord> {
        self.snapshot(|record| record.status == CheckStatus::Checked)
    }

    #[cfg(test)]
    fn get(&self, id: &ProxyId) -> Option<ProxyRecord> {
        self.lock().records.get(id).map(|(_, record)| record.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.lock()
            .records
            .values()
            .filter(|(_, record)| record.status == status)
            .count()
    }

    /// Return abandoned claims to NotChecked. Used after a cancelled validation stage.
    pub fn release_claims(&self) -> usize {
        self.reset_status(CheckStatus::Checking)
    }

    /// Queue every Checked record for another validation cycle
    pub fn reset_checked(&self) -> usize {
        self.reset_status(CheckStatus::Checked)
    }

    fn reset_status(&self, from: CheckStatus) -> usize {
        let released = {
            let mut inner = self.lock();
            let mut released = 0;
            for (_, record) in inner.records.values_mut() {
                if record.status == from {
                    record.status = CheckStatus::NotChecked;
                    released += 1;
                }
            }
            released
        };

        if released > 0 {
            self.inserted.notify_waiters();
        }
        released
    }

    /// Discard every record
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.records.clear();
        inner.by_address.clear();
    }

    /// Resolves on the next insert. Enable it before checking the pool to avoid missing a wakeup.
    pub fn inserted(&self) -> tokio::sync::futures::Notified<'_> {
        self.inserted.notified()
    }
}
