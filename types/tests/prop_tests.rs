use proptest::prelude::*;
use std::time::Duration;

use edgevote_types::{Blob, MerkleHash, Nullifier, Timestamp, VoteEntry, VoteId};

fn entry(id: String, ballot: Vec<u8>, nullifier: [u8; 32], ts: u64) -> VoteEntry {
    VoteEntry {
        id: VoteId::new(id),
        encrypted_vote: Blob::new(ballot),
        commitment: Blob::default(),
        zk_proof: Blob::default(),
        nullifier: Nullifier::new(nullifier),
        timestamp: Timestamp::from_millis(ts),
        credential_signature: None,
    }
}

proptest! {
    /// Once a TTL has expired it stays expired as time moves forward.
    #[test]
    fn expiry_is_monotonic(start in 0u64..1 << 40, ttl in 0u64..1 << 20, a in 0u64..1 << 41, b in 0u64..1 << 41) {
        let t = Timestamp::from_millis(start);
        let ttl = Duration::from_millis(ttl);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        if t.has_expired(ttl, Timestamp::from_millis(lo)) {
            prop_assert!(t.has_expired(ttl, Timestamp::from_millis(hi)));
        }
    }

    /// Hex text parses back to the same digest.
    #[test]
    fn merkle_hash_text_is_lossless(bytes in prop::array::uniform32(0u8..)) {
        let h = MerkleHash::new(bytes);
        prop_assert_eq!(h.to_string().parse::<MerkleHash>().unwrap(), h);
    }

    /// Entries differing only in their nullifier never share a leaf preimage.
    #[test]
    fn nullifier_is_committed(
        id in "[a-z0-9]{1,12}",
        ballot in prop::collection::vec(any::<u8>(), 0..64),
        n1 in prop::array::uniform32(0u8..),
        n2 in prop::array::uniform32(0u8..),
        ts in any::<u64>(),
    ) {
        prop_assume!(n1 != n2);
        let a = entry(id.clone(), ballot.clone(), n1, ts);
        let b = entry(id, ballot, n2, ts);
        prop_assert_ne!(a.canonical_bytes(), b.canonical_bytes());
    }
}
