use edgevote_types::{BatchId, EdgeNodeStatus, MerkleHash, NodeId};
use thiserror::Error;

/// Batch-level and administrative failures.
///
/// Per-vote rejections are not errors; they travel in
/// [`SyncResult::rejected`](crate::SyncResult).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("batch holds {size} votes, the maximum is {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("unknown edge node {0}")]
    UnknownNode(NodeId),

    #[error("edge node {node} is {status} and may not submit batches")]
    NodeNotAuthorized { node: NodeId, status: EdgeNodeStatus },

    #[error("signature on batch {0} does not verify against the node key")]
    InvalidBatchSignature(BatchId),

    #[error("declared batch root {declared} does not match computed root {computed}")]
    MerkleRootMismatch {
        declared: MerkleHash,
        computed: MerkleHash,
    },

    #[error("cannot {action} edge node {node} while it is {from}")]
    InvalidTransition {
        node: NodeId,
        from: EdgeNodeStatus,
        action: &'static str,
    },

    #[error("storage failed after {attempts} attempts: {source}")]
    StorageExhausted {
        attempts: u32,
        #[source]
        source: edgevote_store::StoreError,
    },

    #[error("position {position} is beyond the cloud ledger length {len}")]
    PositionOutOfRange { position: u64, len: u64 },

    #[error("acknowledgement for batch {got} does not match the batch in flight")]
    UnexpectedAck { got: BatchId },

    #[error("sync channel closed")]
    ChannelClosed,

    #[error("ledger error: {0}")]
    Ledger(#[from] edgevote_ledger::LedgerError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether resubmitting the same batch unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageExhausted { .. } | Self::ChannelClosed)
    }

    /// Short stable label, used as a metrics label and an API error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BatchTooLarge { .. } => "batch_too_large",
            Self::UnknownNode(_) => "unknown_node",
            Self::NodeNotAuthorized { .. } => "node_not_authorized",
            Self::InvalidBatchSignature(_) => "invalid_batch_signature",
            Self::MerkleRootMismatch { .. } => "merkle_root_mismatch",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::StorageExhausted { .. } => "storage_unavailable",
            Self::PositionOutOfRange { .. } => "position_out_of_range",
            Self::UnexpectedAck { .. } => "unexpected_ack",
            Self::ChannelClosed => "channel_closed",
            Self::Ledger(_) => "ledger",
            Self::Config(_) => "config",
        }
    }
}
