//! Batch wire format: what an edge node sends and what the cloud answers.

use edgevote_crypto::{blake2b_256_multi, sign_message, verify_signature};
use edgevote_ledger::{leaf_hash, merkle_root};
use edgevote_types::{
    BatchId, ElectionId, MerkleHash, NodeId, PrivateKey, PublicKey, QuestionId, RejectionReason,
    Signature, Timestamp, VoteEntry, VoteId,
};
use serde::{Deserialize, Serialize};

const SIGNING_DOMAIN: &[u8] = b"edgevote/batch/v1";

/// One ballot as shipped from an edge ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncVote {
    #[serde(flatten)]
    pub entry: VoteEntry,
    pub question_id: QuestionId,
    /// Position in the edge node's own ledger for the question.
    pub local_position: u64,
    /// Edge ledger root when the batch was built.
    pub local_merkle_root: MerkleHash,
}

/// A signed group of votes from one edge node for one election.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSyncBatch {
    /// Sender-chosen idempotency key, stable across retries.
    pub batch_id: BatchId,
    pub node_id: NodeId,
    pub election_id: ElectionId,
    pub votes: Vec<SyncVote>,
    pub batch_merkle_root: MerkleHash,
    pub signature: Signature,
    pub submitted_at: Timestamp,
}

impl VoteSyncBatch {
    /// Build and sign a batch. The root is computed from `votes`.
    pub fn new_signed(
        batch_id: BatchId,
        node_id: NodeId,
        election_id: ElectionId,
        votes: Vec<SyncVote>,
        submitted_at: Timestamp,
        private_key: &PrivateKey,
    ) -> Self {
        let batch_merkle_root = batch_merkle_root(&votes);
        let message = signing_message(&batch_id, &batch_merkle_root, &election_id, &node_id);
        Self {
            batch_id,
            node_id,
            election_id,
            votes,
            batch_merkle_root,
            signature: sign_message(&message, private_key),
            submitted_at,
        }
    }

    /// The bytes the node signs.
    pub fn signing_message(&self) -> Vec<u8> {
        signing_message(
            &self.batch_id,
            &self.batch_merkle_root,
            &self.election_id,
            &self.node_id,
        )
    }

    pub fn verify_signature(&self, public_key: &PublicKey) -> bool {
        verify_signature(&self.signing_message(), &self.signature, public_key)
    }

    /// Whether the declared root matches the votes actually carried.
    pub fn computed_root(&self) -> MerkleHash {
        batch_merkle_root(&self.votes)
    }
}

/// `batchId ‖ batchMerkleRoot ‖ electionId ‖ nodeId`, each string field
/// length-prefixed so no two field splits produce the same bytes.
pub fn signing_message(
    batch_id: &BatchId,
    batch_merkle_root: &MerkleHash,
    election_id: &ElectionId,
    node_id: &NodeId,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(SIGNING_DOMAIN.len() + 128);
    out.extend_from_slice(SIGNING_DOMAIN);
    put_str(&mut out, batch_id.as_str());
    out.extend_from_slice(batch_merkle_root.as_bytes());
    put_str(&mut out, election_id.as_str());
    put_str(&mut out, node_id.as_str());
    out
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Merkle root over the votes' commitments in batch order. An empty batch
/// has the empty-tree sentinel root.
pub fn batch_merkle_root(votes: &[SyncVote]) -> MerkleHash {
    merkle_root(votes.iter().map(|v| leaf_hash(v.entry.commitment.as_bytes())))
}

/// Deterministic batch id from the ledger ranges a batch covers.
///
/// `ranges` holds `(question, first position, end position)` with an
/// exclusive end, in question order.
pub fn derive_batch_id(node_id: &NodeId, election_id: &ElectionId, ranges: &[(QuestionId, u64, u64)]) -> BatchId {
    let mut parts: Vec<Vec<u8>> = Vec::with_capacity(2 + ranges.len());
    let mut buf = Vec::new();
    put_str(&mut buf, node_id.as_str());
    put_str(&mut buf, election_id.as_str());
    parts.push(buf);
    for (question, start, end) in ranges {
        let mut buf = Vec::new();
        put_str(&mut buf, question.as_str());
        buf.extend_from_slice(&start.to_be_bytes());
        buf.extend_from_slice(&end.to_be_bytes());
        parts.push(buf);
    }
    let mut slices: Vec<&[u8]> = vec![b"edgevote/batch-id/v1"];
    slices.extend(parts.iter().map(Vec::as_slice));
    let digest = blake2b_256_multi(&slices);
    BatchId::new(format!("b_{}", hex::encode(&digest[..16])))
}

/// A vote the cloud did not accept, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedVote {
    pub vote_id: VoteId,
    pub reason: RejectionReason,
}

/// Outcome of processing one batch. Cached by `batch_id` for replays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub batch_id: BatchId,
    pub accepted: u32,
    pub rejected: Vec<RejectedVote>,
    pub cloud_merkle_root: MerkleHash,
    /// Cloud position of the first accepted vote; the ledger length when
    /// nothing was accepted.
    pub cloud_start_position: u64,
    pub processed_at: Timestamp,
}
