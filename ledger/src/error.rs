use edgevote_types::Nullifier;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The nullifier is already spent in this ledger (`existing` is its
    /// position), or appears twice in the same batch (`existing` is `None`).
    #[error("duplicate nullifier {nullifier}")]
    DuplicateNullifier {
        nullifier: Nullifier,
        existing: Option<u64>,
    },

    #[error("position {position} is beyond the ledger length {len}")]
    PositionOutOfRange { position: u64, len: u64 },

    #[error("entry at position {0} is no longer held in memory and no overflow store is configured")]
    EntryUnavailable(u64),

    #[error("invalid ledger configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] edgevote_store::StoreError),
}
