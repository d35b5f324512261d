//! Per-election rules the cloud applies to individual votes.

use edgevote_authority::AuthorityPublicKey;
use edgevote_types::{Blob, ElectionId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

/// What the cloud knows about one election.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionRules {
    /// When set, every vote must carry a credential signature over its
    /// nullifier that verifies under this key.
    #[serde(default)]
    pub authority_key: Option<AuthorityPublicKey>,
    /// Election encryption key from the key ceremony, passed to the proof
    /// verifier as a public input.
    #[serde(default)]
    pub encryption_key: Option<Blob>,
    /// Votes cast after this instant are refused.
    #[serde(default)]
    pub closes_at: Option<Timestamp>,
}

impl ElectionRules {
    pub fn is_closed_at(&self, cast_at: Timestamp) -> bool {
        self.closes_at.is_some_and(|closes| cast_at > closes)
    }
}

/// Rules for every election the cloud serves. Elections without an entry
/// get [`ElectionRules::default`], which checks nothing extra.
#[derive(Debug, Default)]
pub struct ElectionDirectory {
    rules: RwLock<HashMap<ElectionId, ElectionRules>>,
}

impl ElectionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, election_id: ElectionId, rules: ElectionRules) {
        info!(
            election = %election_id,
            credential_check = rules.authority_key.is_some(),
            closes_at = ?rules.closes_at,
            "election rules updated"
        );
        self.rules.write().unwrap().insert(election_id, rules);
    }

    pub fn get(&self, election_id: &ElectionId) -> ElectionRules {
        self.rules
            .read()
            .unwrap()
            .get(election_id)
            .cloned()
            .unwrap_or_default()
    }
}
