//! Cloud-side batch merge.
//!
//! `process_batch` runs in this order:
//!
//! 1. idempotency: a cached result for the `batchId` is returned verbatim
//! 2. size limit
//! 3. node authorization
//! 4. batch signature
//! 5. batch Merkle root
//! 6. per-vote checks and first-write-wins nullifier resolution
//! 7. persist, then commit to the in-memory ledger
//! 8. cache and return the result
//!
//! Steps 1–5 and the stateless per-vote checks run without any lock.
//! Nullifier resolution, position assignment and persistence hold the
//! election's async mutex, so two batches touching the same election are
//! merged one after the other.

use crate::{
    ElectionDirectory, NodeRegistry, PublicInputs, RejectedVote, ResultCache, RetryPolicy,
    SyncConfig, SyncError, SyncMetrics, SyncResult, SyncVote, VoteSyncBatch, ZkVerifier,
};
use edgevote_authority::verify_nullifier_signature;
use edgevote_ledger::{leaf_hash, MerkleProof, MerkleTree};
use edgevote_store::{LedgerScope, NullifierRecord, StoredEntry, VoteStore};
use edgevote_types::{
    Clock, ElectionId, MerkleHash, NodeId, Nullifier, QuestionId, RejectionReason, Timestamp,
    VoteEntry, VoteId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Merged ledger state for one election.
///
/// Vote ids are chosen by each edge node independently, so they are only
/// indexed per node.
#[derive(Debug, Default)]
struct CloudElection {
    loaded: bool,
    tree: MerkleTree,
    nullifiers: HashMap<(QuestionId, Nullifier), u64>,
    vote_ids: HashMap<(NodeId, VoteId), u64>,
}

impl CloudElection {
    fn record(&mut self, node_id: NodeId, question_id: QuestionId, entry: &VoteEntry) -> u64 {
        let position = self.tree.push(leaf_hash(&entry.canonical_bytes()));
        self.nullifiers.insert((question_id, entry.nullifier), position);
        self.vote_ids.insert((node_id, entry.id.clone()), position);
        position
    }
}

/// The cloud merge service shared by every request handler.
pub struct CloudSync {
    max_batch_size: usize,
    retry: RetryPolicy,
    nodes: Arc<NodeRegistry>,
    results: Arc<ResultCache>,
    directory: Arc<ElectionDirectory>,
    verifier: Arc<dyn ZkVerifier>,
    store: Arc<dyn VoteStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<SyncMetrics>,
    elections: Mutex<HashMap<ElectionId, Arc<tokio::sync::Mutex<CloudElection>>>>,
}

impl CloudSync {
    pub fn new(
        config: &SyncConfig,
        store: Arc<dyn VoteStore>,
        verifier: Arc<dyn ZkVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let directory = ElectionDirectory::new();
        for (election_id, rules) in &config.elections {
            directory.set(election_id.clone(), rules.clone());
        }
        Self {
            max_batch_size: config.max_batch_size,
            retry: config.storage_retry.clone(),
            nodes: Arc::new(NodeRegistry::new()),
            results: Arc::new(ResultCache::new(config.result_ttl())),
            directory: Arc::new(directory),
            verifier,
            store,
            clock,
            metrics: Arc::new(SyncMetrics::new()),
            elections: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_nodes(mut self, nodes: Arc<NodeRegistry>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_directory(mut self, directory: Arc<ElectionDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn nodes(&self) -> &Arc<NodeRegistry> {
        &self.nodes
    }

    pub fn results(&self) -> &Arc<ResultCache> {
        &self.results
    }

    pub fn directory(&self) -> &Arc<ElectionDirectory> {
        &self.directory
    }

    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.metrics
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Merge one batch. See the module docs for the order of checks.
    ///
    /// Structural failures return an error and leave no trace: nothing is
    /// merged and nothing is cached, so a corrected batch can be resent
    /// under the same id.
    pub async fn process_batch(&self, batch: VoteSyncBatch) -> Result<SyncResult, SyncError> {
        let started = Instant::now();
        let now = self.clock.now();

        if let Some(cached) = self.results.get(&batch.batch_id, now) {
            self.metrics.replays_served.inc();
            debug!(batch_id = %batch.batch_id, "replaying cached sync result");
            return Ok(cached);
        }

        let outcome = self.merge(&batch, now).await;
        match &outcome {
            Ok(result) => {
                self.metrics.batches_processed.inc();
                self.metrics.votes_accepted.inc_by(u64::from(result.accepted));
                for rejected in &result.rejected {
                    self.metrics
                        .votes_rejected
                        .with_label_values(&[rejected.reason.as_str()])
                        .inc();
                }
                self.metrics
                    .batch_process_time_ms
                    .observe(started.elapsed().as_secs_f64() * 1000.0);
            }
            Err(err) => {
                self.metrics
                    .batches_rejected
                    .with_label_values(&[err.code()])
                    .inc();
                warn!(batch_id = %batch.batch_id, node = %batch.node_id, error = %err, "batch refused");
            }
        }
        self.metrics.cached_results.set(self.results.len() as i64);
        outcome
    }

    async fn merge(&self, batch: &VoteSyncBatch, now: Timestamp) -> Result<SyncResult, SyncError> {
        if batch.votes.len() > self.max_batch_size {
            return Err(SyncError::BatchTooLarge {
                size: batch.votes.len(),
                max: self.max_batch_size,
            });
        }

        let lease = self.nodes.begin_sync(&batch.node_id)?;

        if !batch.verify_signature(lease.public_key()) {
            return Err(SyncError::InvalidBatchSignature(batch.batch_id.clone()));
        }

        let computed = batch.computed_root();
        if computed != batch.batch_merkle_root {
            return Err(SyncError::MerkleRootMismatch {
                declared: batch.batch_merkle_root,
                computed,
            });
        }

        let mut rejected: Vec<(usize, RejectedVote)> = Vec::new();
        let candidates = self.precheck_votes(batch, &mut rejected);

        let handle = self.election_handle(&batch.election_id);
        let mut election = handle.lock().await;

        // A concurrent submission of the same batch may have finished while
        // this one waited for the lock.
        if let Some(cached) = self.results.get(&batch.batch_id, now) {
            self.metrics.replays_served.inc();
            return Ok(cached);
        }

        self.ensure_loaded(&batch.election_id, &mut election).await?;

        let start = election.tree.len();
        let mut staged: Vec<(usize, &SyncVote)> = Vec::with_capacity(candidates.len());
        let mut staged_nullifiers: HashSet<(&QuestionId, &Nullifier)> = HashSet::new();
        let mut staged_ids: HashSet<&VoteId> = HashSet::new();

        for (index, vote) in candidates {
            let entry = &vote.entry;
            // A vote id this node already got merged is a re-send, whatever
            // its nullifier.
            let resent = election
                .vote_ids
                .contains_key(&(batch.node_id.clone(), entry.id.clone()))
                || staged_ids.contains(&entry.id);
            let reason = if resent {
                Some(RejectionReason::AlreadySynced)
            } else if election
                .nullifiers
                .contains_key(&(vote.question_id.clone(), entry.nullifier))
                || staged_nullifiers.contains(&(&vote.question_id, &entry.nullifier))
                || self
                    .nullifier_in_store(&batch.election_id, &vote.question_id, &entry.nullifier)
                    .await?
            {
                Some(RejectionReason::DuplicateNullifier)
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    debug!(batch_id = %batch.batch_id, vote = %entry.id, %reason, "vote rejected");
                    rejected.push((
                        index,
                        RejectedVote {
                            vote_id: entry.id.clone(),
                            reason,
                        },
                    ));
                }
                None => {
                    staged_nullifiers.insert((&vote.question_id, &entry.nullifier));
                    staged_ids.insert(&entry.id);
                    staged.push((index, vote));
                }
            }
        }

        if !staged.is_empty() {
            self.persist(batch, start, &staged, now).await?;
        }
        for (_, vote) in &staged {
            election.record(batch.node_id.clone(), vote.question_id.clone(), &vote.entry);
        }

        rejected.sort_by_key(|(index, _)| *index);
        let result = SyncResult {
            batch_id: batch.batch_id.clone(),
            accepted: staged.len() as u32,
            rejected: rejected.into_iter().map(|(_, r)| r).collect(),
            cloud_merkle_root: election.tree.root(),
            cloud_start_position: start,
            processed_at: now,
        };
        self.results.insert(result.clone(), now);
        drop(election);
        lease.complete(now);

        info!(
            batch_id = %result.batch_id,
            node = %batch.node_id,
            election = %batch.election_id,
            accepted = result.accepted,
            rejected = result.rejected.len(),
            start = result.cloud_start_position,
            "batch merged"
        );
        Ok(result)
    }

    /// Checks that need no ledger state: closing time, credential
    /// signature, ballot proof. Returns the votes that passed, with their
    /// index in the batch.
    fn precheck_votes<'b>(
        &self,
        batch: &'b VoteSyncBatch,
        rejected: &mut Vec<(usize, RejectedVote)>,
    ) -> Vec<(usize, &'b SyncVote)> {
        let rules = self.directory.get(&batch.election_id);
        let mut passed = Vec::with_capacity(batch.votes.len());
        for (index, vote) in batch.votes.iter().enumerate() {
            let entry = &vote.entry;
            let reason = if rules.is_closed_at(entry.timestamp) {
                Some(RejectionReason::ElectionClosed)
            } else if rules.authority_key.as_ref().is_some_and(|key| {
                !entry.credential_signature.as_ref().is_some_and(|sig| {
                    verify_nullifier_signature(&batch.election_id, &entry.nullifier, sig, key)
                })
            }) {
                Some(RejectionReason::InvalidSignature)
            } else {
                let inputs = PublicInputs {
                    election_id: &batch.election_id,
                    question_id: &vote.question_id,
                    encrypted_vote: &entry.encrypted_vote,
                    commitment: &entry.commitment,
                    nullifier: &entry.nullifier,
                    encryption_key: rules.encryption_key.as_ref(),
                };
                (!self.verifier.verify_proof(&entry.zk_proof, &inputs))
                    .then_some(RejectionReason::InvalidProof)
            };
            match reason {
                Some(reason) => {
                    debug!(batch_id = %batch.batch_id, vote = %entry.id, %reason, "vote rejected");
                    rejected.push((
                        index,
                        RejectedVote {
                            vote_id: entry.id.clone(),
                            reason,
                        },
                    ));
                }
                None => passed.push((index, vote)),
            }
        }
        passed
    }

    async fn nullifier_in_store(
        &self,
        election_id: &ElectionId,
        question_id: &QuestionId,
        nullifier: &Nullifier,
    ) -> Result<bool, SyncError> {
        self.retry
            .run(
                "nullifier_exists",
                || self.store.nullifier_exists(election_id, question_id, nullifier),
                || self.metrics.storage_retries.inc(),
            )
            .await
    }

    /// Entries first, then nullifier records. The records are the commit
    /// marker: entries left behind by a failed nullifier write have no
    /// matching record, are skipped on rehydration and get overwritten by
    /// the next merge at the same positions.
    async fn persist(
        &self,
        batch: &VoteSyncBatch,
        start: u64,
        staged: &[(usize, &SyncVote)],
        now: Timestamp,
    ) -> Result<(), SyncError> {
        let scope = LedgerScope::election(batch.election_id.clone());
        let entries: Vec<StoredEntry> = staged
            .iter()
            .enumerate()
            .map(|(offset, (_, vote))| StoredEntry {
                scope: scope.clone(),
                position: start + offset as u64,
                question_id: vote.question_id.clone(),
                entry: vote.entry.clone(),
            })
            .collect();
        let records: Vec<NullifierRecord> = entries
            .iter()
            .map(|stored| NullifierRecord {
                election_id: batch.election_id.clone(),
                question_id: stored.question_id.clone(),
                nullifier: stored.entry.nullifier,
                vote_id: stored.entry.id.clone(),
                node_id: batch.node_id.clone(),
                position: stored.position,
                recorded_at: now,
            })
            .collect();

        self.retry
            .run(
                "persist_entries",
                || self.store.persist_entries(&entries),
                || self.metrics.storage_retries.inc(),
            )
            .await?;
        self.retry
            .run(
                "persist_nullifiers",
                || self.store.persist_nullifiers(&records),
                || self.metrics.storage_retries.inc(),
            )
            .await
    }

    fn election_handle(&self, election_id: &ElectionId) -> Arc<tokio::sync::Mutex<CloudElection>> {
        self.elections
            .lock()
            .unwrap()
            .entry(election_id.clone())
            .or_default()
            .clone()
    }

    /// Rebuild the election's tree and indexes from storage on first use.
    async fn ensure_loaded(
        &self,
        election_id: &ElectionId,
        election: &mut CloudElection,
    ) -> Result<(), SyncError> {
        if election.loaded {
            return Ok(());
        }
        let scope = LedgerScope::election(election_id.clone());
        let stored = self
            .retry
            .run(
                "entries_for_scope",
                || self.store.entries_for_scope(&scope),
                || self.metrics.storage_retries.inc(),
            )
            .await?;
        // Built aside so a storage error part way leaves nothing half loaded.
        let mut rebuilt = CloudElection::default();
        for (expected, stored) in stored.into_iter().enumerate() {
            // Committed entries form a prefix. Anything after a gap or an
            // entry without its nullifier record belongs to a merge that
            // never committed.
            if stored.position != expected as u64 {
                warn!(election = %election_id, position = stored.position, "ignoring stored entries after gap");
                break;
            }
            let Some(node_id) = self.committed_by(election_id, &rebuilt, &stored).await? else {
                warn!(
                    election = %election_id,
                    position = stored.position,
                    vote = %stored.entry.id,
                    "ignoring uncommitted stored entries"
                );
                break;
            };
            rebuilt.record(node_id, stored.question_id, &stored.entry);
        }
        rebuilt.loaded = true;
        *election = rebuilt;
        if !election.tree.is_empty() {
            info!(election = %election_id, entries = election.tree.len(), "cloud ledger rehydrated");
        }
        Ok(())
    }

    /// The node whose merge committed `stored`, or `None` when the entry has
    /// no nullifier record pointing back at it or would reuse a nullifier
    /// already rebuilt.
    async fn committed_by(
        &self,
        election_id: &ElectionId,
        election: &CloudElection,
        stored: &StoredEntry,
    ) -> Result<Option<NodeId>, SyncError> {
        if election
            .nullifiers
            .contains_key(&(stored.question_id.clone(), stored.entry.nullifier))
        {
            return Ok(None);
        }
        let record = self
            .retry
            .run(
                "get_nullifier",
                || {
                    self.store
                        .get_nullifier(election_id, &stored.question_id, &stored.entry.nullifier)
                },
                || self.metrics.storage_retries.inc(),
            )
            .await?;
        Ok(record
            .filter(|r| r.vote_id == stored.entry.id && r.position == stored.position)
            .map(|r| r.node_id))
    }

    /// Current merged root for an election.
    pub async fn root(&self, election_id: &ElectionId) -> Result<MerkleHash, SyncError> {
        let handle = self.election_handle(election_id);
        let mut election = handle.lock().await;
        self.ensure_loaded(election_id, &mut election).await?;
        Ok(election.tree.root())
    }

    /// Number of votes merged for an election.
    pub async fn len(&self, election_id: &ElectionId) -> Result<u64, SyncError> {
        let handle = self.election_handle(election_id);
        let mut election = handle.lock().await;
        self.ensure_loaded(election_id, &mut election).await?;
        Ok(election.tree.len())
    }

    /// Inclusion proof for a merged vote against the current root.
    pub async fn proof(&self, election_id: &ElectionId, position: u64) -> Result<MerkleProof, SyncError> {
        let handle = self.election_handle(election_id);
        let mut election = handle.lock().await;
        self.ensure_loaded(election_id, &mut election).await?;
        election
            .tree
            .proof(position)
            .ok_or(SyncError::PositionOutOfRange {
                position,
                len: election.tree.len(),
            })
    }

    /// The merged vote at `position`, read from storage. Slots past the
    /// merged length may hold uncommitted writes and read as `None`.
    pub async fn entry(&self, election_id: &ElectionId, position: u64) -> Result<Option<StoredEntry>, SyncError> {
        if position >= self.len(election_id).await? {
            return Ok(None);
        }
        let scope = LedgerScope::election(election_id.clone());
        self.retry
            .run(
                "get_entry",
                || self.store.get_entry(&scope, position),
                || self.metrics.storage_retries.inc(),
            )
            .await
    }
}

impl std::fmt::Debug for CloudSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudSync")
            .field("max_batch_size", &self.max_batch_size)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

