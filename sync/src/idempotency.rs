//! Result cache keyed by `batchId`, and its background sweeper.

use crate::SyncResult;
use edgevote_types::{BatchId, Clock, Timestamp};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug)]
struct CachedResult {
    result: SyncResult,
    stored_at: Timestamp,
}

/// Processed batch results, kept for `ttl` so a retried batch gets the
/// original answer instead of being merged again.
#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    entries: Mutex<HashMap<BatchId, CachedResult>>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached result for `batch_id`, unless it has expired.
    pub fn get(&self, batch_id: &BatchId, now: Timestamp) -> Option<SyncResult> {
        let entries = self.entries.lock().unwrap();
        let cached = entries.get(batch_id)?;
        if cached.stored_at.has_expired(self.ttl, now) {
            return None;
        }
        Some(cached.result.clone())
    }

    pub fn insert(&self, result: SyncResult, now: Timestamp) {
        self.entries.lock().unwrap().insert(
            result.batch_id.clone(),
            CachedResult {
                result,
                stored_at: now,
            },
        );
    }

    /// Drop expired results. Returns how many were removed.
    pub fn sweep(&self, now: Timestamp) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, cached| !cached.stored_at.has_expired(self.ttl, now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodically sweep `cache` until `shutdown` fires.
///
/// Runs on its own task; request handling only ever takes the cache lock
/// for a single lookup or insert.
pub fn spawn_sweeper(
    cache: Arc<ResultCache>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = cache.sweep(clock.now());
                    if removed > 0 {
                        debug!(removed, remaining = cache.len(), "swept expired sync results");
                    }
                }
                _ = shutdown.recv() => {
                    info!("result cache sweeper stopping");
                    break;
                }
            }
        }
    })
}
