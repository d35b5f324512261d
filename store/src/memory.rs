//! Volatile in-memory storage backend.

use crate::{EntryStore, LedgerScope, NullifierRecord, NullifierStore, StoreError, StoredEntry};
use edgevote_types::{ElectionId, Nullifier, QuestionId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

type NullifierKey = (ElectionId, QuestionId, Nullifier);

/// Thread-safe storage that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<(LedgerScope, u64), StoredEntry>>,
    nullifiers: Mutex<HashMap<NullifierKey, NullifierRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn nullifier_count(&self) -> usize {
        self.nullifiers.lock().unwrap().len()
    }
}

impl EntryStore for MemoryStore {
    fn persist_entries(&self, entries: &[StoredEntry]) -> Result<(), StoreError> {
        let mut map = self.entries.lock().unwrap();
        for stored in entries {
            map.insert((stored.scope.clone(), stored.position), stored.clone());
        }
        Ok(())
    }

    fn get_entry(&self, scope: &LedgerScope, position: u64) -> Result<Option<StoredEntry>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&(scope.clone(), position))
            .cloned())
    }

    fn entries_for_scope(&self, scope: &LedgerScope) -> Result<Vec<StoredEntry>, StoreError> {
        let start = (scope.clone(), 0);
        let end = (scope.clone(), u64::MAX);
        Ok(self
            .entries
            .lock()
            .unwrap()
            .range(start..=end)
            .map(|(_, stored)| stored.clone())
            .collect())
    }
}

impl NullifierStore for MemoryStore {
    fn persist_nullifiers(&self, records: &[NullifierRecord]) -> Result<(), StoreError> {
        let mut map = self.nullifiers.lock().unwrap();
        for record in records {
            let key = (
                record.election_id.clone(),
                record.question_id.clone(),
                record.nullifier,
            );
            map.entry(key).or_insert_with(|| record.clone());
        }
        Ok(())
    }

    fn get_nullifier(
        &self,
        election_id: &ElectionId,
        question_id: &QuestionId,
        nullifier: &Nullifier,
    ) -> Result<Option<NullifierRecord>, StoreError> {
        let key = (election_id.clone(), question_id.clone(), *nullifier);
        Ok(self.nullifiers.lock().unwrap().get(&key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgevote_types::{Blob, NodeId, Timestamp, VoteEntry, VoteId};

    fn stored(scope: &LedgerScope, position: u64, id: &str) -> StoredEntry {
        StoredEntry {
            scope: scope.clone(),
            position,
            question_id: QuestionId::new("Q1"),
            entry: VoteEntry {
                id: VoteId::new(id),
                encrypted_vote: Blob::new(vec![1]),
                commitment: Blob::new(vec![2]),
                zk_proof: Blob::new(vec![3]),
                nullifier: Nullifier::new([position as u8; 32]),
                timestamp: Timestamp::from_millis(1_000),
                credential_signature: None,
            },
        }
    }

    fn record(vote: &str, nullifier: u8) -> NullifierRecord {
        NullifierRecord {
            election_id: ElectionId::new("E1"),
            question_id: QuestionId::new("Q1"),
            nullifier: Nullifier::new([nullifier; 32]),
            vote_id: VoteId::new(vote),
            node_id: NodeId::new("node-a"),
            position: 0,
            recorded_at: Timestamp::from_millis(1),
        }
    }

    #[test]
    fn entries_are_scoped_and_ordered() {
        let store = MemoryStore::new();
        let e1 = LedgerScope::election(ElectionId::new("E1"));
        let e1q1 = LedgerScope::question(ElectionId::new("E1"), QuestionId::new("Q1"));
        store
            .persist_entries(&[stored(&e1, 1, "b"), stored(&e1, 0, "a"), stored(&e1q1, 0, "c")])
            .unwrap();

        let all: Vec<_> = store
            .entries_for_scope(&e1)
            .unwrap()
            .into_iter()
            .map(|s| s.position)
            .collect();
        assert_eq!(all, vec![0, 1]);
        assert_eq!(store.entries_for_scope(&e1q1).unwrap().len(), 1);
        assert!(store.get_entry(&e1, 2).unwrap().is_none());
        assert_eq!(store.get_entry(&e1, 1).unwrap().unwrap().entry.id, VoteId::new("b"));
    }

    #[test]
    fn rewriting_an_entry_replaces_it() {
        let store = MemoryStore::new();
        let scope = LedgerScope::election(ElectionId::new("E1"));
        store.persist_entries(&[stored(&scope, 0, "a")]).unwrap();
        store.persist_entries(&[stored(&scope, 0, "a")]).unwrap();
        assert_eq!(store.entry_count(), 1);
    }

    #[test]
    fn first_nullifier_record_is_kept() {
        let store = MemoryStore::new();
        store.persist_nullifiers(&[record("v1", 7)]).unwrap();
        store.persist_nullifiers(&[record("v2", 7)]).unwrap();
        assert_eq!(store.nullifier_count(), 1);
        let kept = store
            .get_nullifier(
                &ElectionId::new("E1"),
                &QuestionId::new("Q1"),
                &Nullifier::new([7; 32]),
            )
            .unwrap()
            .unwrap();
        assert_eq!(kept.vote_id, VoteId::new("v1"));
        assert!(store
            .nullifier_exists(
                &ElectionId::new("E1"),
                &QuestionId::new("Q1"),
                &Nullifier::new([7; 32])
            )
            .unwrap());
        assert!(!store
            .nullifier_exists(
                &ElectionId::new("E1"),
                &QuestionId::new("Q2"),
                &Nullifier::new([7; 32])
            )
            .unwrap());
    }

    #[test]
    fn scope_display() {
        let scope = LedgerScope::question(ElectionId::new("E1"), QuestionId::new("Q1"));
        assert_eq!(scope.to_string(), "E1/Q1");
        assert_eq!(LedgerScope::election(ElectionId::new("E1")).to_string(), "E1");
    }
}
