//! Edge-side outbox: turns unsynced ledger entries into signed batches.

use crate::batch::derive_batch_id;
use crate::{SyncClient, SyncError, SyncResult, SyncVote, VoteSyncBatch};
use edgevote_ledger::LedgerRegistry;
use edgevote_types::{BatchId, ElectionId, KeyPair, NodeId, QuestionId, Timestamp};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct InFlight {
    batch: VoteSyncBatch,
    /// `(question, start, end)` with `end` exclusive.
    ranges: Vec<(QuestionId, u64, u64)>,
}

/// Tracks how far each question's ledger has been synced and builds the
/// next batch.
///
/// At most one batch is in flight. Until it is acknowledged,
/// [`next_batch`](Self::next_batch) returns the very same batch, so a
/// retry after a lost response carries the same `batchId`.
pub struct EdgeOutbox {
    node_id: NodeId,
    keys: KeyPair,
    election_id: ElectionId,
    max_batch_size: usize,
    cursors: BTreeMap<QuestionId, u64>,
    in_flight: Option<InFlight>,
}

impl EdgeOutbox {
    pub fn new(node_id: NodeId, keys: KeyPair, election_id: ElectionId, max_batch_size: usize) -> Self {
        Self {
            node_id,
            keys,
            election_id,
            max_batch_size: max_batch_size.max(1),
            cursors: BTreeMap::new(),
            in_flight: None,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// First position of `question_id` not yet acknowledged by the cloud.
    pub fn cursor(&self, question_id: &QuestionId) -> u64 {
        self.cursors.get(question_id).copied().unwrap_or(0)
    }

    pub fn in_flight(&self) -> Option<&BatchId> {
        self.in_flight.as_ref().map(|f| &f.batch.batch_id)
    }

    /// The batch to send next, or `None` when everything is synced.
    pub fn next_batch(
        &mut self,
        ledgers: &LedgerRegistry,
        now: Timestamp,
    ) -> Result<Option<VoteSyncBatch>, SyncError> {
        if let Some(pending) = &self.in_flight {
            return Ok(Some(pending.batch.clone()));
        }

        let mut votes = Vec::new();
        let mut ranges = Vec::new();
        for ledger in ledgers.election_ledgers(&self.election_id) {
            let room = self.max_batch_size - votes.len();
            if room == 0 {
                break;
            }
            let question = ledger.question_id();
            let cursor = self.cursor(question);
            let entries = ledger.entries_since(cursor, room)?;
            if entries.is_empty() {
                continue;
            }
            let root = ledger.root();
            let end = cursor + entries.len() as u64;
            ranges.push((question.clone(), cursor, end));
            votes.extend(entries.into_iter().map(|(position, entry)| SyncVote {
                entry,
                question_id: question.clone(),
                local_position: position,
                local_merkle_root: root,
            }));
        }
        if votes.is_empty() {
            return Ok(None);
        }

        let batch_id = derive_batch_id(&self.node_id, &self.election_id, &ranges);
        let batch = VoteSyncBatch::new_signed(
            batch_id,
            self.node_id.clone(),
            self.election_id.clone(),
            votes,
            now,
            &self.keys.private,
        );
        debug!(batch_id = %batch.batch_id, votes = batch.votes.len(), "built sync batch");
        self.in_flight = Some(InFlight {
            batch: batch.clone(),
            ranges,
        });
        Ok(Some(batch))
    }

    /// Advance cursors past the in-flight batch once the cloud answered.
    ///
    /// Rejected votes count as synced: their rejection is final.
    pub fn acknowledge(&mut self, result: &SyncResult) -> Result<(), SyncError> {
        match &self.in_flight {
            Some(pending) if pending.batch.batch_id == result.batch_id => {}
            _ => {
                return Err(SyncError::UnexpectedAck {
                    got: result.batch_id.clone(),
                })
            }
        }
        if let Some(pending) = self.in_flight.take() {
            for (question, _, end) in pending.ranges {
                self.cursors.insert(question, end);
            }
        }
        Ok(())
    }

    /// Send pending entries until the ledgers are drained or a send fails.
    ///
    /// Returns every result received. A retryable failure leaves the batch
    /// in flight for the next call.
    pub async fn sync_all(
        &mut self,
        ledgers: &LedgerRegistry,
        client: &SyncClient,
        now: Timestamp,
    ) -> Result<Vec<SyncResult>, SyncError> {
        let mut results = Vec::new();
        while let Some(batch) = self.next_batch(ledgers, now)? {
            let batch_id = batch.batch_id.clone();
            match client.submit(batch).await {
                Ok(result) => {
                    self.acknowledge(&result)?;
                    info!(
                        batch_id = %batch_id,
                        accepted = result.accepted,
                        rejected = result.rejected.len(),
                        "batch acknowledged"
                    );
                    results.push(result);
                }
                Err(err) => {
                    if !err.is_retryable() {
                        warn!(batch_id = %batch_id, error = %err, "batch refused by cloud");
                    }
                    return Err(err);
                }
            }
        }
        Ok(results)
    }
}

impl std::fmt::Debug for EdgeOutbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeOutbox")
            .field("node_id", &self.node_id)
            .field("election_id", &self.election_id)
            .field("cursors", &self.cursors)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgevote_crypto::{derive_node_id, keypair_from_seed};
    use edgevote_ledger::LedgerConfig;
    use edgevote_types::{Blob, MerkleHash, Nullifier, VoteEntry, VoteId};

    fn entry(n: u8) -> VoteEntry {
        VoteEntry {
            id: VoteId::new(format!("v{n}")),
            encrypted_vote: Blob::new(vec![n]),
            commitment: Blob::new(vec![n, 0xcc]),
            zk_proof: Blob::new(vec![1]),
            nullifier: Nullifier::new([n; 32]),
            timestamp: Timestamp::from_millis(5),
            credential_signature: None,
        }
    }

    fn setup(max: usize) -> (EdgeOutbox, LedgerRegistry) {
        let keys = keypair_from_seed(&[9; 32]);
        let node_id = derive_node_id(&keys.public);
        let outbox = EdgeOutbox::new(node_id, keys, ElectionId::new("E1"), max);
        let mut ledgers = LedgerRegistry::new(LedgerConfig::default(), None).unwrap();
        let e = ElectionId::new("E1");
        for n in 0..3 {
            ledgers.ledger_mut(&e, &QuestionId::new("Q1")).unwrap().append(entry(n)).unwrap();
        }
        ledgers
            .ledger_mut(&e, &QuestionId::new("Q2"))
            .unwrap()
            .append(entry(10))
            .unwrap();
        (outbox, ledgers)
    }

    fn ack(batch: &VoteSyncBatch) -> SyncResult {
        SyncResult {
            batch_id: batch.batch_id.clone(),
            accepted: batch.votes.len() as u32,
            rejected: vec![],
            cloud_merkle_root: MerkleHash::ZERO,
            cloud_start_position: 0,
            processed_at: Timestamp::from_millis(6),
        }
    }

    #[test]
    fn unacknowledged_batch_is_resent_unchanged() {
        let (mut outbox, ledgers) = setup(10);
        let first = outbox.next_batch(&ledgers, Timestamp::from_millis(1)).unwrap().unwrap();
        let again = outbox.next_batch(&ledgers, Timestamp::from_millis(2)).unwrap().unwrap();
        assert_eq!(first, again);
        assert_eq!(first.votes.len(), 4);
        assert_eq!(first.batch_merkle_root, first.computed_root());
    }

    #[test]
    fn acknowledgement_advances_cursors() {
        let (mut outbox, mut ledgers) = setup(2);
        let b1 = outbox.next_batch(&ledgers, Timestamp::EPOCH).unwrap().unwrap();
        assert_eq!(b1.votes.len(), 2);
        outbox.acknowledge(&ack(&b1)).unwrap();
        assert_eq!(outbox.cursor(&QuestionId::new("Q1")), 2);

        let b2 = outbox.next_batch(&ledgers, Timestamp::EPOCH).unwrap().unwrap();
        assert_ne!(b1.batch_id, b2.batch_id);
        assert_eq!(b2.votes[0].local_position, 2);
        assert_eq!(b2.votes[1].question_id, QuestionId::new("Q2"));
        outbox.acknowledge(&ack(&b2)).unwrap();
        assert!(outbox.next_batch(&ledgers, Timestamp::EPOCH).unwrap().is_none());

        ledgers
            .ledger_mut(&ElectionId::new("E1"), &QuestionId::new("Q1"))
            .unwrap()
            .append(entry(3))
            .unwrap();
        let b3 = outbox.next_batch(&ledgers, Timestamp::EPOCH).unwrap().unwrap();
        assert_eq!(b3.votes.len(), 1);
    }

    #[test]
    fn stray_acknowledgement_is_refused() {
        let (mut outbox, ledgers) = setup(10);
        let batch = outbox.next_batch(&ledgers, Timestamp::EPOCH).unwrap().unwrap();
        let mut wrong = ack(&batch);
        wrong.batch_id = BatchId::new("other");
        assert!(matches!(
            outbox.acknowledge(&wrong),
            Err(SyncError::UnexpectedAck { .. })
        ));
        assert_eq!(outbox.in_flight(), Some(&batch.batch_id));
    }

    #[test]
    fn same_ranges_give_same_batch_id_after_restart() {
        let (mut a, ledgers) = setup(10);
        let (mut b, _) = setup(10);
        let first = a.next_batch(&ledgers, Timestamp::from_millis(1)).unwrap().unwrap();
        let second = b.next_batch(&ledgers, Timestamp::from_millis(99)).unwrap().unwrap();
        assert_eq!(first.batch_id, second.batch_id);
    }
}
