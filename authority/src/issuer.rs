//! The issuing side: one authority per election.

use crate::blind::{self, BlindSignature};
use crate::credential::{IssuanceRequest, IssuanceResponse};
use crate::keys::{AuthorityKeyPair, AuthorityPublicKey, KeyPolicy};
use crate::AuthorityError;
use edgevote_types::ElectionId;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{debug, info};

/// Signs blinded credential requests for a single election.
///
/// The authority authenticates voters out of band and passes an opaque
/// `voter_ref` to [`issue`](Self::issue); it records only that the voter
/// was served, never what was signed. Each voter receives at most one
/// credential per election.
#[derive(Debug)]
pub struct CredentialAuthority {
    election_id: ElectionId,
    keys: AuthorityKeyPair,
    issued: Mutex<HashSet<String>>,
}

impl CredentialAuthority {
    pub fn new(
        election_id: ElectionId,
        keys: AuthorityKeyPair,
        policy: KeyPolicy,
    ) -> Result<Self, AuthorityError> {
        policy.check(keys.public().bits())?;
        info!(election = %election_id, key_id = %keys.key_id(), "credential authority ready");
        Ok(Self {
            election_id,
            keys,
            issued: Mutex::new(HashSet::new()),
        })
    }

    pub fn election_id(&self) -> &ElectionId {
        &self.election_id
    }

    pub fn public_key(&self) -> &AuthorityPublicKey {
        self.keys.public()
    }

    /// Number of voters served so far.
    pub fn issued_count(&self) -> usize {
        self.issued.lock().map(|set| set.len()).unwrap_or_default()
    }

    /// Sign `request` for the authenticated voter `voter_ref`.
    ///
    /// A second request from the same voter is refused with
    /// [`AuthorityError::AlreadyIssued`]. The voter is only marked as
    /// served once signing succeeds.
    pub fn issue(
        &self,
        voter_ref: &str,
        request: &IssuanceRequest,
    ) -> Result<IssuanceResponse, AuthorityError> {
        if request.election_id != self.election_id {
            return Err(AuthorityError::ElectionMismatch {
                expected: self.election_id.to_string(),
                got: request.election_id.to_string(),
            });
        }

        let mut issued = self
            .issued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if issued.contains(voter_ref) {
            debug!(election = %self.election_id, "repeat issuance request refused");
            return Err(AuthorityError::AlreadyIssued);
        }

        let blinded_signature: BlindSignature = blind::sign(&request.blinded_message, &self.keys)?;
        issued.insert(voter_ref.to_string());
        debug!(election = %self.election_id, served = issued.len(), "credential issued");

        Ok(IssuanceResponse {
            key_id: self.keys.key_id().to_string(),
            blinded_signature,
        })
    }
}
