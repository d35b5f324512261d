//! Cryptographic primitives for edgevote.
//!
//! - **Blake2b-256** for Merkle leaves, batch roots and node-id derivation
//! - **Ed25519** for edge-node batch signatures
//!
//! The authority's RSA blind signatures live in `edgevote-authority`.

pub mod hash;
pub mod keys;
pub mod node_id;
pub mod sign;

pub use hash::{blake2b_256, blake2b_256_multi};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use node_id::derive_node_id;
pub use sign::{sign_message, verify_signature};
