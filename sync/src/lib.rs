//! Edge-to-cloud vote sync.
//!
//! Edge nodes keep local vote ledgers and ship them to the cloud in signed
//! batches whenever connectivity allows:
//!
//! - **Edge**: [`EdgeOutbox`] builds a [`VoteSyncBatch`] from unsynced
//!   ledger entries, with a deterministic `batchId` so a retry after a lost
//!   response is recognised.
//! - **Cloud**: [`CloudSync::process_batch`] authenticates the batch,
//!   merges its votes into one ledger per election with first-write-wins
//!   nullifier resolution, and caches the [`SyncResult`] by `batchId`.
//! - **Transport**: [`SyncChannel`] connects the two in-process; the RPC
//!   crate exposes the same operations over HTTP.

pub mod batch;
pub mod channel;
pub mod cloud;
pub mod config;
pub mod directory;
pub mod edge;
pub mod error;
pub mod idempotency;
pub mod metrics;
pub mod node_registry;
pub mod retry;
pub mod verifier;

pub use batch::{
    batch_merkle_root, derive_batch_id, signing_message, RejectedVote, SyncResult, SyncVote,
    VoteSyncBatch,
};
pub use channel::{serve_channel, SyncChannel, SyncClient, SyncHandle, SyncRequest};
pub use cloud::CloudSync;
pub use config::SyncConfig;
pub use directory::{ElectionDirectory, ElectionRules};
pub use edge::EdgeOutbox;
pub use error::SyncError;
pub use idempotency::{spawn_sweeper, ResultCache};
pub use metrics::SyncMetrics;
pub use node_registry::{EdgeNode, NodeRegistration, NodeRegistry, SyncLease};
pub use retry::RetryPolicy;
pub use verifier::{NonEmptyProof, PublicInputs, ZkVerifier};
