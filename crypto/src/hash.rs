//! Blake2b-256 hashing.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Hash several byte slices as if concatenated, without allocating.
///
/// Callers mixing variable-length parts are responsible for making the
/// concatenation unambiguous (fixed widths or length prefixes).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(blake2b_256(b"ballot"), blake2b_256(b"ballot"));
    }

    #[test]
    fn distinct_inputs_differ() {
        assert_ne!(blake2b_256(b"yes"), blake2b_256(b"no"));
    }

    #[test]
    fn multi_matches_concatenation() {
        let single = blake2b_256(b"edgevote");
        let multi = blake2b_256_multi(&[b"edge", b"vote"]);
        assert_eq!(single, multi);
    }

    #[test]
    fn empty_input_is_not_zero() {
        assert_ne!(blake2b_256(b""), [0u8; 32]);
    }
}
