//! Two-tier entry storage: a bounded in-memory window over the most
//! recent entries, backed by a durable store for everything older.

use crate::LedgerError;
use edgevote_store::{EntryStore, LedgerScope, StoredEntry, VoteStore};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// Entry bodies for one ledger.
///
/// With no limit every entry stays in memory. With a limit, entries are
/// written through to the store as they leave the window, and lookups for
/// older positions fall back to the store.
pub struct EntryTiers {
    scope: LedgerScope,
    /// Position of `recent[0]`.
    first_recent: u64,
    recent: VecDeque<StoredEntry>,
    limit: Option<usize>,
    store: Option<Arc<dyn VoteStore>>,
}

impl EntryTiers {
    /// Keep everything in memory.
    pub fn unbounded(scope: LedgerScope) -> Self {
        Self {
            scope,
            first_recent: 0,
            recent: VecDeque::new(),
            limit: None,
            store: None,
        }
    }

    /// Keep at most `limit` entries in memory and spill the rest to `store`.
    pub fn bounded(scope: LedgerScope, limit: usize, store: Arc<dyn VoteStore>) -> Self {
        Self {
            scope,
            first_recent: 0,
            recent: VecDeque::with_capacity(limit.min(4096)),
            limit: Some(limit),
            store: Some(store),
        }
    }

    /// Start a window at `next_position`, for a ledger whose earlier
    /// entries already live in the store.
    pub(crate) fn resume_at(&mut self, next_position: u64) {
        self.first_recent = next_position;
        self.recent.clear();
    }

    pub fn scope(&self) -> &LedgerScope {
        &self.scope
    }

    pub fn in_memory(&self) -> usize {
        self.recent.len()
    }

    /// Add entries at the end of the ledger, in position order.
    ///
    /// Anything that falls out of the window is persisted first; if that
    /// fails nothing changes.
    pub fn extend(&mut self, entries: Vec<StoredEntry>) -> Result<(), LedgerError> {
        let Some(limit) = self.limit else {
            self.recent.extend(entries);
            return Ok(());
        };
        let overflow = (self.recent.len() + entries.len()).saturating_sub(limit);
        if overflow > 0 {
            let spilled: Vec<StoredEntry> = self
                .recent
                .iter()
                .chain(entries.iter())
                .take(overflow)
                .cloned()
                .collect();
            if let Some(store) = &self.store {
                store.persist_entries(&spilled)?;
            }
            trace!(scope = %self.scope, spilled = spilled.len(), "entries moved to overflow store");
        }

        self.recent.extend(entries);
        for _ in 0..overflow {
            self.recent.pop_front();
        }
        self.first_recent += overflow as u64;
        Ok(())
    }

    /// Look an entry up in memory, then in the store.
    pub fn get(&self, position: u64) -> Result<Option<StoredEntry>, LedgerError> {
        if position >= self.first_recent {
            let idx = (position - self.first_recent) as usize;
            return Ok(self.recent.get(idx).cloned());
        }
        match &self.store {
            Some(store) => Ok(store.get_entry(&self.scope, position)?),
            None => Err(LedgerError::EntryUnavailable(position)),
        }
    }
}

impl std::fmt::Debug for EntryTiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryTiers")
            .field("scope", &self.scope)
            .field("first_recent", &self.first_recent)
            .field("in_memory", &self.recent.len())
            .field("limit", &self.limit)
            .finish()
    }
}
