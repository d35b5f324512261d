//! Fundamental types for edgevote.
//!
//! This crate defines the vocabulary shared by every other crate in the
//! workspace: identifiers, hashes, nullifiers, timestamps, key material,
//! edge-node status and per-vote rejection reasons, and the ballot entry
//! stored in every ledger.

pub mod clock;
pub mod entry;
pub mod error;
pub mod hash;
pub mod ids;
pub mod keys;
pub mod nullifier;
pub mod state;
pub mod time;

mod hex_bytes;

pub use clock::{Clock, SystemClock};
pub use entry::VoteEntry;
pub use error::TypesError;
pub use hash::MerkleHash;
pub use hex_bytes::Blob;
pub use ids::{BatchId, ElectionId, NodeId, QuestionId, VoteId};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use nullifier::Nullifier;
pub use state::{EdgeNodeStatus, RejectionReason};
pub use time::Timestamp;
