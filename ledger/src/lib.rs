//! Append-only vote ledger.
//!
//! Each `(election, question)` has its own ledger. Entries get dense
//! positions from 0 in append order and are committed to by a binary
//! Blake2b Merkle tree, so any entry's inclusion is provable against the
//! current root with a logarithmic proof. A nullifier can appear at most
//! once per ledger.

pub mod error;
pub mod merkle;
pub mod registry;
pub mod tiers;
pub mod vote_ledger;

pub use edgevote_store::LedgerScope;
pub use error::LedgerError;
pub use merkle::{leaf_hash, merkle_root, node_hash, MerkleProof, MerkleTree, ProofStep, Side, EMPTY_ROOT};
pub use registry::LedgerRegistry;
pub use tiers::EntryTiers;
pub use vote_ledger::{AppendReceipt, LedgerConfig, VoteLedger};
