//! The per-question vote ledger.

use crate::merkle::{leaf_hash, MerkleProof, MerkleTree};
use crate::tiers::EntryTiers;
use crate::LedgerError;
use edgevote_store::{LedgerScope, StoredEntry, VoteStore};
use edgevote_types::{ElectionId, MerkleHash, Nullifier, QuestionId, VoteEntry};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Ledger memory settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Keep at most this many entry bodies in memory. `None` keeps all.
    /// Leaf hashes and the nullifier index are always kept in full.
    #[serde(default)]
    pub memory_entry_limit: Option<usize>,
}

/// Where an appended entry landed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendReceipt {
    pub position: u64,
    pub proof: MerkleProof,
}

/// Append-only ledger for one `(election, question)`.
#[derive(Debug)]
pub struct VoteLedger {
    election_id: ElectionId,
    question_id: QuestionId,
    tree: MerkleTree,
    nullifiers: HashMap<Nullifier, u64>,
    entries: EntryTiers,
}

impl VoteLedger {
    /// A ledger holding every entry in memory.
    pub fn new(election_id: ElectionId, question_id: QuestionId) -> Self {
        let scope = LedgerScope::question(election_id.clone(), question_id.clone());
        Self::with_tiers(election_id, question_id, EntryTiers::unbounded(scope))
    }

    /// A ledger configured by `config`. A memory limit requires a store
    /// for the entries that leave memory.
    pub fn with_config(
        election_id: ElectionId,
        question_id: QuestionId,
        config: &LedgerConfig,
        store: Option<Arc<dyn VoteStore>>,
    ) -> Result<Self, LedgerError> {
        let scope = LedgerScope::question(election_id.clone(), question_id.clone());
        let tiers = match (config.memory_entry_limit, store) {
            (None, _) => EntryTiers::unbounded(scope),
            (Some(0), _) => {
                return Err(LedgerError::Config("memory_entry_limit must be positive".into()))
            }
            (Some(limit), Some(store)) => EntryTiers::bounded(scope, limit, store),
            (Some(_), None) => {
                return Err(LedgerError::Config(
                    "memory_entry_limit requires an overflow store".into(),
                ))
            }
        };
        Ok(Self::with_tiers(election_id, question_id, tiers))
    }

    /// Rebuild a bounded ledger from entries already in `store`.
    ///
    /// Tree and nullifier index are reconstructed in full; entry bodies
    /// stay in the store until read.
    pub fn restore(
        election_id: ElectionId,
        question_id: QuestionId,
        limit: usize,
        store: Arc<dyn VoteStore>,
    ) -> Result<Self, LedgerError> {
        let scope = LedgerScope::question(election_id.clone(), question_id.clone());
        let stored = store.entries_for_scope(&scope)?;
        let mut ledger = Self::with_tiers(
            election_id,
            question_id,
            EntryTiers::bounded(scope, limit.max(1), store),
        );
        for (expected, record) in stored.iter().enumerate() {
            if record.position != expected as u64 {
                return Err(LedgerError::Storage(edgevote_store::StoreError::Backend(
                    format!("gap in stored ledger at position {expected}"),
                )));
            }
            let position = ledger.tree.push(leaf_hash(&record.entry.canonical_bytes()));
            ledger.nullifiers.insert(record.entry.nullifier, position);
        }
        ledger.entries.resume_at(ledger.tree.len());
        debug!(scope = %ledger.entries.scope(), len = ledger.len(), "ledger restored from store");
        Ok(ledger)
    }

    fn with_tiers(election_id: ElectionId, question_id: QuestionId, entries: EntryTiers) -> Self {
        Self {
            election_id,
            question_id,
            tree: MerkleTree::new(),
            nullifiers: HashMap::new(),
            entries,
        }
    }

    pub fn election_id(&self) -> &ElectionId {
        &self.election_id
    }

    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    pub fn len(&self) -> u64 {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn root(&self) -> MerkleHash {
        self.tree.root()
    }

    /// Append one entry. Refused if its nullifier is already in the ledger.
    pub fn append(&mut self, entry: VoteEntry) -> Result<AppendReceipt, LedgerError> {
        let mut receipts = self.append_batch(vec![entry])?;
        // append_batch returns exactly one receipt per input entry.
        receipts
            .pop()
            .ok_or(LedgerError::PositionOutOfRange { position: 0, len: 0 })
    }

    /// Append entries in order, all or none.
    ///
    /// Every nullifier is checked against the ledger and against the rest
    /// of the batch before anything is hashed.
    pub fn append_batch(&mut self, entries: Vec<VoteEntry>) -> Result<Vec<AppendReceipt>, LedgerError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if let Some(&existing) = self.nullifiers.get(&entry.nullifier) {
                return Err(LedgerError::DuplicateNullifier {
                    nullifier: entry.nullifier,
                    existing: Some(existing),
                });
            }
            if !seen.insert(entry.nullifier) {
                return Err(LedgerError::DuplicateNullifier {
                    nullifier: entry.nullifier,
                    existing: None,
                });
            }
        }

        let start = self.tree.len();
        let stored: Vec<StoredEntry> = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| StoredEntry {
                scope: self.entries.scope().clone(),
                position: start + i as u64,
                question_id: self.question_id.clone(),
                entry,
            })
            .collect();
        let leaves: Vec<(MerkleHash, Nullifier)> = stored
            .iter()
            .map(|s| (leaf_hash(&s.entry.canonical_bytes()), s.entry.nullifier))
            .collect();

        // Storage is the only fallible step; do it before touching the tree.
        self.entries.extend(stored)?;

        for (leaf, nullifier) in &leaves {
            let position = self.tree.push(*leaf);
            self.nullifiers.insert(*nullifier, position);
        }
        debug!(
            scope = %self.entries.scope(),
            start,
            count = leaves.len(),
            "entries appended"
        );

        (start..self.tree.len())
            .map(|position| self.get_proof(position))
            .collect::<Result<Vec<_>, _>>()
            .map(|proofs| {
                proofs
                    .into_iter()
                    .map(|proof| AppendReceipt {
                        position: proof.position,
                        proof,
                    })
                    .collect()
            })
    }

    /// Inclusion proof for `position` against the current root.
    pub fn get_proof(&self, position: u64) -> Result<MerkleProof, LedgerError> {
        self.tree
            .proof(position)
            .ok_or(LedgerError::PositionOutOfRange {
                position,
                len: self.tree.len(),
            })
    }

    /// Check a proof without access to any ledger.
    pub fn verify(proof: &MerkleProof) -> bool {
        proof.verify()
    }

    pub fn find_position_by_nullifier(&self, nullifier: &Nullifier) -> Option<u64> {
        self.nullifiers.get(nullifier).copied()
    }

    /// The entry at `position`, from memory or the overflow store.
    pub fn entry(&self, position: u64) -> Result<Option<VoteEntry>, LedgerError> {
        if position >= self.tree.len() {
            return Ok(None);
        }
        Ok(self.entries.get(position)?.map(|stored| stored.entry))
    }

    /// Entries from `cursor` (inclusive) to the end, at most `limit`.
    pub fn entries_since(&self, cursor: u64, limit: usize) -> Result<Vec<(u64, VoteEntry)>, LedgerError> {
        let end = self.tree.len().min(cursor.saturating_add(limit as u64));
        let mut out = Vec::with_capacity(end.saturating_sub(cursor) as usize);
        for position in cursor..end {
            match self.entries.get(position)? {
                Some(stored) => out.push((position, stored.entry)),
                None => return Err(LedgerError::EntryUnavailable(position)),
            }
        }
        Ok(out)
    }

    /// Entry bodies currently held in memory.
    pub fn entries_in_memory(&self) -> usize {
        self.entries.in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgevote_store::MemoryStore;
    use edgevote_types::{Blob, Timestamp, VoteId};

    fn entry(n: u8) -> VoteEntry {
        VoteEntry {
            id: VoteId::new(format!("v{n}")),
            encrypted_vote: Blob::new(vec![n, 1]),
            commitment: Blob::new(vec![n, 2]),
            zk_proof: Blob::new(vec![n, 3]),
            nullifier: Nullifier::new([n; 32]),
            timestamp: Timestamp::from_millis(n as u64),
            credential_signature: None,
        }
    }

    fn ledger() -> VoteLedger {
        VoteLedger::new(ElectionId::new("E1"), QuestionId::new("Q1"))
    }

    #[test]
    fn positions_are_dense_from_zero() {
        let mut l = ledger();
        for n in 0..5 {
            assert_eq!(l.append(entry(n)).unwrap().position, n as u64);
        }
        assert_eq!(l.len(), 5);
    }

    #[test]
    fn duplicate_nullifier_is_rejected() {
        let mut l = ledger();
        l.append(entry(1)).unwrap();
        let mut dup = entry(2);
        dup.nullifier = Nullifier::new([1; 32]);
        let root = l.root();
        assert!(matches!(
            l.append(dup),
            Err(LedgerError::DuplicateNullifier {
                existing: Some(0),
                ..
            })
        ));
        assert_eq!(l.root(), root);
        assert_eq!(l.len(), 1);
    }

    #[test]
    fn batch_with_internal_duplicate_changes_nothing() {
        let mut l = ledger();
        l.append(entry(0)).unwrap();
        let root = l.root();
        let mut dup = entry(3);
        dup.nullifier = Nullifier::new([2; 32]);
        let err = l.append_batch(vec![entry(1), entry(2), dup]).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::DuplicateNullifier { existing: None, .. }
        ));
        assert_eq!(l.len(), 1);
        assert_eq!(l.root(), root);
        assert!(l.find_position_by_nullifier(&Nullifier::new([1; 32])).is_none());
    }

    #[test]
    fn old_proofs_verify_after_later_appends() {
        let mut l = ledger();
        let first = l.append(entry(0)).unwrap();
        assert!(VoteLedger::verify(&first.proof));
        for n in 1..9 {
            l.append(entry(n)).unwrap();
        }
        let proof = l.get_proof(0).unwrap();
        assert!(VoteLedger::verify(&proof));
        assert!(proof.verify_leaf_data(&entry(0).canonical_bytes()));
        assert_eq!(proof.root, l.root());
        // The stale proof still verifies against the root it was issued for.
        assert!(VoteLedger::verify(&first.proof));
        assert_ne!(first.proof.root, l.root());
    }

    #[test]
    fn find_position_by_nullifier() {
        let mut l = ledger();
        l.append_batch((0..4).map(entry).collect()).unwrap();
        assert_eq!(l.find_position_by_nullifier(&Nullifier::new([2; 32])), Some(2));
        assert_eq!(l.find_position_by_nullifier(&Nullifier::new([9; 32])), None);
    }

    #[test]
    fn memory_limit_requires_store() {
        let config = LedgerConfig {
            memory_entry_limit: Some(2),
        };
        assert!(matches!(
            VoteLedger::with_config(ElectionId::new("E1"), QuestionId::new("Q1"), &config, None),
            Err(LedgerError::Config(_))
        ));
    }

    #[test]
    fn bounded_ledger_serves_old_entries_from_store() {
        let store = Arc::new(MemoryStore::new());
        let config = LedgerConfig {
            memory_entry_limit: Some(2),
        };
        let mut l = VoteLedger::with_config(
            ElectionId::new("E1"),
            QuestionId::new("Q1"),
            &config,
            Some(store.clone()),
        )
        .unwrap();
        l.append_batch((0..6).map(entry).collect()).unwrap();

        assert_eq!(l.entries_in_memory(), 2);
        assert_eq!(store.entry_count(), 4);
        assert_eq!(l.entry(1).unwrap().unwrap(), entry(1));
        assert_eq!(l.entries_since(3, 10).unwrap().len(), 3);
        // Index and proofs are unaffected by eviction.
        assert_eq!(l.find_position_by_nullifier(&Nullifier::new([0; 32])), Some(0));
        assert!(l.get_proof(0).unwrap().verify());
    }

    #[test]
    fn restore_rebuilds_root_and_index() {
        let store = Arc::new(MemoryStore::new());
        let config = LedgerConfig {
            memory_entry_limit: Some(1),
        };
        let mut l = VoteLedger::with_config(
            ElectionId::new("E1"),
            QuestionId::new("Q1"),
            &config,
            Some(store.clone()),
        )
        .unwrap();
        l.append_batch((0..4).map(entry).collect()).unwrap();
        // Flush the last in-memory entry by pushing one more.
        l.append(entry(4)).unwrap();
        let root_before = l.root();

        // Only entries 0..4 reached the store.
        let restored =
            VoteLedger::restore(ElectionId::new("E1"), QuestionId::new("Q1"), 1, store).unwrap();
        assert_eq!(restored.len(), 4);
        assert_eq!(
            restored.root(),
            MerkleTree::from_leaves((0..4).map(|n| leaf_hash(&entry(n).canonical_bytes()))).root()
        );
        assert_ne!(restored.root(), root_before);
        assert_eq!(restored.find_position_by_nullifier(&Nullifier::new([3; 32])), Some(3));
        assert_eq!(restored.entry(2).unwrap().unwrap(), entry(2));
    }
}
