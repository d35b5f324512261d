//! Seam to the external ballot-proof verifier.

use edgevote_types::{Blob, ElectionId, Nullifier, QuestionId};

/// Public inputs a ballot well-formedness proof is checked against.
#[derive(Clone, Copy, Debug)]
pub struct PublicInputs<'a> {
    pub election_id: &'a ElectionId,
    pub question_id: &'a QuestionId,
    pub encrypted_vote: &'a Blob,
    pub commitment: &'a Blob,
    pub nullifier: &'a Nullifier,
    pub encryption_key: Option<&'a Blob>,
}

/// The zero-knowledge proof subsystem. Proofs are opaque here.
pub trait ZkVerifier: Send + Sync {
    fn verify_proof(&self, proof: &Blob, inputs: &PublicInputs<'_>) -> bool;
}

/// Refuses only empty proofs.
///
/// For deployments where ballots are proof-checked before they reach the
/// edge node and the cloud only needs a structural guard.
#[derive(Clone, Copy, Debug, Default)]
pub struct NonEmptyProof;

impl ZkVerifier for NonEmptyProof {
    fn verify_proof(&self, proof: &Blob, _inputs: &PublicInputs<'_>) -> bool {
        !proof.is_empty()
    }
}
