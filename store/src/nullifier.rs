//! Nullifier record storage trait.

use crate::StoreError;
use edgevote_types::{ElectionId, NodeId, Nullifier, QuestionId, Timestamp, VoteId};
use serde::{Deserialize, Serialize};

/// Proof that a nullifier has been spent on an accepted vote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NullifierRecord {
    pub election_id: ElectionId,
    pub question_id: QuestionId,
    pub nullifier: Nullifier,
    pub vote_id: VoteId,
    /// Edge node that submitted the accepted vote.
    pub node_id: NodeId,
    /// Position of the accepting entry in the cloud ledger.
    pub position: u64,
    pub recorded_at: Timestamp,
}

/// Trait for spent-nullifier storage.
///
/// Keys are `(election, question, nullifier)`. A record, once written, is
/// never replaced by one for a different vote.
///
/// `persist_nullifiers` writes every record of the call or none of them.
/// The cloud merge writes records after the entries they point at, so a
/// stored entry without a matching record was never committed.
pub trait NullifierStore {
    fn persist_nullifiers(&self, records: &[NullifierRecord]) -> Result<(), StoreError>;

    fn get_nullifier(
        &self,
        election_id: &ElectionId,
        question_id: &QuestionId,
        nullifier: &Nullifier,
    ) -> Result<Option<NullifierRecord>, StoreError>;

    fn nullifier_exists(
        &self,
        election_id: &ElectionId,
        question_id: &QuestionId,
        nullifier: &Nullifier,
    ) -> Result<bool, StoreError> {
        Ok(self.get_nullifier(election_id, question_id, nullifier)?.is_some())
    }
}
