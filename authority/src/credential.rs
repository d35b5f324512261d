//! Client-side credential lifecycle and the issuance exchange.
//!
//! 1. [`Credential::generate`] picks a random nullifier for the election.
//! 2. [`Credential::begin_issuance`] blinds the credential message and
//!    yields the [`IssuanceRequest`] sent to the authority plus the
//!    [`BlindingState`] the client keeps.
//! 3. The authority answers with an [`IssuanceResponse`].
//! 4. [`Credential::finish_issuance`] unblinds and verifies, producing the
//!    [`SignedCredential`] the voter presents when casting.

use crate::blind::{self, BlindSignature, BlindedMessage, BlindingFactor, CredentialSignature};
use crate::keys::AuthorityPublicKey;
use crate::AuthorityError;
use edgevote_crypto::blake2b_256_multi;
use edgevote_types::{Blob, ElectionId, Nullifier};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

const CREDENTIAL_DOMAIN: &[u8] = b"edgevote/credential/v1";

/// `hash(electionId || nullifier)`, length-prefixed and domain-separated.
pub fn credential_message(election_id: &ElectionId, nullifier: &Nullifier) -> [u8; 32] {
    let election = election_id.as_str().as_bytes();
    blake2b_256_multi(&[
        CREDENTIAL_DOMAIN,
        &(election.len() as u64).to_be_bytes(),
        election,
        nullifier.as_bytes(),
    ])
}

/// Check a credential signature presented alongside a ballot.
///
/// This is the cloud-side check that a nullifier was authorised by the
/// election's authority, without learning which voter holds it.
pub fn verify_nullifier_signature(
    election_id: &ElectionId,
    nullifier: &Nullifier,
    signature: &Blob,
    public_key: &AuthorityPublicKey,
) -> bool {
    let message = credential_message(election_id, nullifier);
    let sig = CredentialSignature::from_bytes(signature.as_bytes());
    blind::verify_fdh(&message, &sig, public_key)
}

/// An unsigned credential. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub election_id: ElectionId,
    pub nullifier: Nullifier,
    #[serde(with = "hex::serde")]
    pub message: [u8; 32],
}

/// What the voter holds between blinding and unblinding. Never sent to the
/// authority and dropped (zeroizing `r`) once issuance finishes.
#[derive(Debug)]
pub struct BlindingState {
    key_id: String,
    blinded_message: BlindedMessage,
    factor: BlindingFactor,
}

impl BlindingState {
    pub fn blinded_message(&self) -> &BlindedMessage {
        &self.blinded_message
    }
}

/// Client → authority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceRequest {
    pub election_id: ElectionId,
    pub blinded_message: BlindedMessage,
}

/// Authority → client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceResponse {
    pub key_id: String,
    pub blinded_signature: BlindSignature,
}

/// A credential with a verified authority signature. Unrecoverable if lost.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedCredential {
    #[serde(flatten)]
    pub credential: Credential,
    pub signature: CredentialSignature,
}

impl Credential {
    /// New credential with a fresh 256-bit nullifier from the OS CSPRNG.
    pub fn generate(election_id: ElectionId) -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self::with_nullifier(election_id, Nullifier::new(bytes))
    }

    pub fn with_nullifier(election_id: ElectionId, nullifier: Nullifier) -> Self {
        let message = credential_message(&election_id, &nullifier);
        Self {
            election_id,
            nullifier,
            message,
        }
    }

    /// Blind this credential's message under `public_key`.
    pub fn begin_issuance(&self, public_key: &AuthorityPublicKey) -> (IssuanceRequest, BlindingState) {
        let (blinded_message, factor) = blind::blind_fdh(&self.message, public_key);
        let request = IssuanceRequest {
            election_id: self.election_id.clone(),
            blinded_message: blinded_message.clone(),
        };
        let state = BlindingState {
            key_id: public_key.key_id.clone(),
            blinded_message,
            factor,
        };
        (request, state)
    }

    /// Unblind the authority's answer and verify it.
    ///
    /// Consumes the blinding state, so `r` cannot be reused. Returns an
    /// error rather than a credential whenever the signature does not
    /// verify.
    pub fn finish_issuance(
        self,
        state: BlindingState,
        response: &IssuanceResponse,
        public_key: &AuthorityPublicKey,
    ) -> Result<SignedCredential, AuthorityError> {
        if state.key_id != public_key.key_id || response.key_id != public_key.key_id {
            return Err(AuthorityError::KeyMismatch {
                expected: state.key_id,
                got: response.key_id.clone(),
            });
        }
        let signature = blind::unblind(&response.blinded_signature, state.factor, public_key)?;
        if !blind::verify_fdh(&self.message, &signature, public_key) {
            return Err(AuthorityError::InvalidSignature);
        }
        Ok(SignedCredential {
            credential: self,
            signature,
        })
    }
}

impl SignedCredential {
    pub fn election_id(&self) -> &ElectionId {
        &self.credential.election_id
    }

    pub fn nullifier(&self) -> &Nullifier {
        &self.credential.nullifier
    }

    /// Re-check the signature, e.g. at vote-casting time.
    pub fn verify(&self, public_key: &AuthorityPublicKey) -> bool {
        self.credential.message == credential_message(&self.credential.election_id, &self.credential.nullifier)
            && blind::verify_fdh(&self.credential.message, &self.signature, public_key)
    }

    /// The signature in the form carried on a ballot entry.
    pub fn signature_blob(&self, public_key: &AuthorityPublicKey) -> Blob {
        Blob::new(self.signature.to_bytes(public_key))
    }
}
