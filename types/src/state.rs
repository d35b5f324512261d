//! Closed state enums for edge nodes and per-vote rejections.

use crate::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trust status of an edge node as seen by the cloud.
///
/// ```text
/// pending --activate--> active --revoke--> revoked
///                       active <--> syncing
///                       active --stale--> inactive --activate--> active
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeNodeStatus {
    /// Registered, awaiting administrator activation.
    Pending,
    /// Trusted; batches are accepted.
    Active,
    /// Flagged stale by the health monitor; batches are refused.
    Inactive,
    /// Trusted and currently transmitting at least one batch.
    Syncing,
    /// Permanently distrusted. Terminal.
    Revoked,
}

impl EdgeNodeStatus {
    /// Whether a batch from a node in this status may be processed.
    pub fn can_submit(&self) -> bool {
        matches!(self, Self::Active | Self::Syncing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Syncing => "syncing",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for EdgeNodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single vote inside an otherwise valid batch was not accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// The nullifier was already recorded for this election and question.
    DuplicateNullifier,
    /// The external verifier refused the ballot's well-formedness proof.
    InvalidProof,
    /// The submitting node already had a vote with this id merged.
    AlreadySynced,
    /// The credential signature over the nullifier did not verify.
    InvalidSignature,
    /// The vote was cast after the election closed.
    ElectionClosed,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateNullifier => "duplicate_nullifier",
            Self::InvalidProof => "invalid_proof",
            Self::AlreadySynced => "already_synced",
            Self::InvalidSignature => "invalid_signature",
            Self::ElectionClosed => "election_closed",
        }
    }

    /// Whether this rejection means the ballot was already counted, as
    /// opposed to being malformed or late.
    pub fn is_already_voted(&self) -> bool {
        matches!(self, Self::DuplicateNullifier | Self::AlreadySynced)
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RejectionReason {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "duplicate_nullifier" => Ok(Self::DuplicateNullifier),
            "invalid_proof" => Ok(Self::InvalidProof),
            "already_synced" => Ok(Self::AlreadySynced),
            "invalid_signature" => Ok(Self::InvalidSignature),
            "election_closed" => Ok(Self::ElectionClosed),
            other => Err(TypesError::UnknownVariant {
                kind: "rejection reason",
                value: other.to_string(),
            }),
        }
    }
}
