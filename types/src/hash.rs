//! 32-byte digests used for Merkle leaves, interior nodes and roots.

use crate::hex_bytes::hex_newtype;
use std::fmt;

/// A 32-byte Blake2b digest.
///
/// Serialized as a 64-character lowercase hex string so roots can be
/// compared by eye in logs and on the wire.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MerkleHash([u8; 32]);

impl MerkleHash {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl Default for MerkleHash {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Debug for MerkleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MerkleHash({}\u{2026})", hex::encode(&self.0[..4]))
    }
}

hex_newtype!(MerkleHash, 32);
