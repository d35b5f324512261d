//! Ledger entry storage trait.

use crate::StoreError;
use edgevote_types::{ElectionId, QuestionId, VoteEntry};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which ledger a stored entry belongs to.
///
/// Edge ledgers are kept per `(election, question)`. The cloud keeps one
/// merged ledger per election, which has no question.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerScope {
    pub election_id: ElectionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<QuestionId>,
}

impl LedgerScope {
    pub fn question(election_id: ElectionId, question_id: QuestionId) -> Self {
        Self {
            election_id,
            question_id: Some(question_id),
        }
    }

    pub fn election(election_id: ElectionId) -> Self {
        Self {
            election_id,
            question_id: None,
        }
    }
}

impl fmt::Display for LedgerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.question_id {
            Some(q) => write!(f, "{}/{}", self.election_id, q),
            None => write!(f, "{}", self.election_id),
        }
    }
}

/// A ledger entry at its assigned position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    pub scope: LedgerScope,
    pub position: u64,
    /// The question the ballot answers. Equal to `scope.question_id` on
    /// edge ledgers; carried separately for the merged cloud ledger.
    pub question_id: QuestionId,
    pub entry: VoteEntry,
}

/// Trait for ledger entry storage.
///
/// Keys are `(scope, position)`. Writing the same key twice replaces the
/// record, so a retried write after a partial failure is harmless.
pub trait EntryStore {
    /// Persist a group of entries.
    fn persist_entries(&self, entries: &[StoredEntry]) -> Result<(), StoreError>;

    /// Retrieve one entry, or `None` if nothing was stored at `position`.
    fn get_entry(&self, scope: &LedgerScope, position: u64) -> Result<Option<StoredEntry>, StoreError>;

    /// All entries of a ledger in position order.
    fn entries_for_scope(&self, scope: &LedgerScope) -> Result<Vec<StoredEntry>, StoreError>;
}
