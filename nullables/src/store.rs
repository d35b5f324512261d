//! Nullable store: in-memory storage with injectable failures.

use edgevote_store::{
    EntryStore, LedgerScope, MemoryStore, NullifierRecord, NullifierStore, StoreError, StoredEntry,
};
use edgevote_types::{ElectionId, Nullifier, QuestionId};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// A [`MemoryStore`] that can be told to fail.
///
/// `fail_next(n)` makes the next `n` write calls return
/// [`StoreError::Unavailable`]; `set_down(true)` fails every call until
/// cleared. `fail_nullifier_writes(true)` fails only nullifier writes, so
/// entry writes land and the merge dies between the two. Reads fail only
/// while the store is down.
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    down: AtomicBool,
    nullifier_writes_down: AtomicBool,
    failures_left: AtomicU32,
    write_calls: AtomicU32,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn fail_nullifier_writes(&self, fail: bool) {
        self.nullifier_writes_down.store(fail, Ordering::SeqCst);
    }

    /// Write calls attempted so far, failed or not.
    pub fn write_calls(&self) -> u32 {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is down".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check_read()?;
        let took = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if took.is_ok() {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

impl EntryStore for FaultyStore {
    fn persist_entries(&self, entries: &[StoredEntry]) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.persist_entries(entries)
    }

    fn get_entry(&self, scope: &LedgerScope, position: u64) -> Result<Option<StoredEntry>, StoreError> {
        self.check_read()?;
        self.inner.get_entry(scope, position)
    }

    fn entries_for_scope(&self, scope: &LedgerScope) -> Result<Vec<StoredEntry>, StoreError> {
        self.check_read()?;
        self.inner.entries_for_scope(scope)
    }
}

impl NullifierStore for FaultyStore {
    fn persist_nullifiers(&self, records: &[NullifierRecord]) -> Result<(), StoreError> {
        self.check_write()?;
        if self.nullifier_writes_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("nullifier table is down".into()));
        }
        self.inner.persist_nullifiers(records)
    }

    fn get_nullifier(
        &self,
        election_id: &ElectionId,
        question_id: &QuestionId,
        nullifier: &Nullifier,
    ) -> Result<Option<NullifierRecord>, StoreError> {
        self.check_read()?;
        self.inner.get_nullifier(election_id, question_id, nullifier)
    }
}
