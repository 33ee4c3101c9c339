//! Ephemeral report handoff store
//!
//! A generated `ReportModel` is posted once and then viewed through a URL that
//! carries only its id. Entries live for a bounded time and the store holds a
//! bounded number of them.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::ReportModel;

pub const PURGE_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    model: ReportModel,
    stored_at: Instant,
    // insertion order; ties on `stored_at` are common on coarse clocks
    seq: u64,
}

#[derive(Clone)]
pub struct ReportStore {
    entries: Arc<DashMap<Uuid, Entry>>,
    next_seq: Arc<AtomicU64>,
    ttl: Duration,
    capacity: usize,
}

impl ReportStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            next_seq: Arc::new(AtomicU64::new(0)),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Store `model`, evicting the oldest entries when full
    pub fn put(&self, model: ReportModel) -> Uuid {
        let id = Uuid::new_v4();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            id,
            Entry {
                model,
                stored_at: Instant::now(),
                seq,
            },
        );

        // Insert first; every put then trims the store back to capacity
        while self.entries.len() > self.capacity {
            if !self.evict_oldest() {
                break;
            }
        }
        id
    }

    /// Look up a stored report; expired entries are removed and reported missing
    pub fn get(&self, id: &Uuid) -> Option<ReportModel> {
        if self
            .entries
            .remove_if(id, |_, entry| self.is_expired(entry))
            .is_some()
        {
            tracing::debug!(%id, "handoff entry expired");
            return None;
        }

        self.entries.get(id).map(|entry| entry.model.clone())
    }

    pub fn remove(&self, id: &Uuid) -> Option<ReportModel> {
        self.entries.remove(id).map(|(_, entry)| entry.model)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Purge expired entries every `interval` until the runtime shuts down
    pub fn spawn_purge_task(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let purged = store.purge_expired();
                if purged > 0 {
                    tracing::info!(purged, remaining = store.len(), "purged expired reports");
                }
            }
        })
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        entry.stored_at.elapsed() >= self.ttl
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().seq)
            .map(|e| *e.key());

        // A concurrent put may have removed it already
        match oldest {
            Some(id) => {
                if self.entries.remove(&id).is_some() {
                    tracing::debug!(%id, "handoff store full, evicted oldest report");
                }
                true
            }
            None => false,
        }
    }
}
