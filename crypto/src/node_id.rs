//! Edge-node identifier derivation.

use crate::hash::blake2b_256_multi;
use edgevote_types::{NodeId, PublicKey};

const NODE_ID_DOMAIN: &[u8] = b"edgevote/node-id/v1";

/// Bytes of the public-key hash kept in a node id.
pub const NODE_ID_BYTES: usize = 16;

/// Derive a node's id from its public key: a truncated, domain-separated
/// Blake2b hash, hex-encoded. Re-registering the same key always yields
/// the same id.
pub fn derive_node_id(public_key: &PublicKey) -> NodeId {
    let digest = blake2b_256_multi(&[NODE_ID_DOMAIN, public_key.as_bytes()]);
    let hex: String = digest[..NODE_ID_BYTES]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    NodeId::new(format!("node_{hex}"))
}
