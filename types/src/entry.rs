//! The ballot entry stored in every vote ledger.

use crate::{Blob, Nullifier, Timestamp, VoteId};
use serde::{Deserialize, Serialize};

/// One cast ballot. Immutable once appended to a ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteEntry {
    pub id: VoteId,
    /// Ciphertext under the election key. Never decrypted here.
    pub encrypted_vote: Blob,
    pub commitment: Blob,
    /// Ballot well-formedness proof, checked by an external verifier.
    pub zk_proof: Blob,
    pub nullifier: Nullifier,
    pub timestamp: Timestamp,
    /// Authority blind signature over the credential message for
    /// `nullifier`, when the voter presents it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_signature: Option<Blob>,
}

impl VoteEntry {
    /// Unambiguous byte encoding used as the Merkle leaf preimage.
    ///
    /// Variable-length fields are prefixed with their length as a
    /// big-endian `u64`, so no two distinct entries share an encoding.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            128 + self.encrypted_vote.len() + self.commitment.len() + self.zk_proof.len(),
        );
        put_var(&mut out, self.id.as_str().as_bytes());
        put_var(&mut out, self.encrypted_vote.as_bytes());
        put_var(&mut out, self.commitment.as_bytes());
        put_var(&mut out, self.zk_proof.as_bytes());
        out.extend_from_slice(self.nullifier.as_bytes());
        out.extend_from_slice(&self.timestamp.as_millis().to_be_bytes());
        match &self.credential_signature {
            Some(sig) => {
                out.push(1);
                put_var(&mut out, sig.as_bytes());
            }
            None => out.push(0),
        }
        out
    }
}

fn put_var(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> VoteEntry {
        VoteEntry {
            id: VoteId::new(id),
            encrypted_vote: Blob::new(vec![1, 2, 3]),
            commitment: Blob::new(vec![4, 5]),
            zk_proof: Blob::new(vec![6]),
            nullifier: Nullifier::new([3u8; 32]),
            timestamp: Timestamp::from_millis(42),
            credential_signature: None,
        }
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let mut a = entry("v");
        a.encrypted_vote = Blob::new(vec![1, 2]);
        a.commitment = Blob::new(vec![3]);
        let mut b = entry("v");
        b.encrypted_vote = Blob::new(vec![1]);
        b.commitment = Blob::new(vec![2, 3]);
        assert_ne!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn credential_presence_changes_encoding() {
        let a = entry("v");
        let mut b = entry("v");
        b.credential_signature = Some(Blob::default());
        assert_ne!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn json_uses_camel_case() {
        let json = serde_json::to_value(entry("v1")).unwrap();
        assert!(json.get("encryptedVote").is_some());
        assert!(json.get("zkProof").is_some());
        assert!(json.get("credentialSignature").is_none());
    }
}
