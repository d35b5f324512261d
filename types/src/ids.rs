//! String identifiers for elections, questions, votes, batches and edge nodes.
//!
//! All are opaque to the protocol; they only need to be stable and
//! comparable. Each is a distinct type so an election id can never be
//! passed where a question id is expected.

use crate::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Build an identifier, rejecting the empty string.
            pub fn parse(raw: impl Into<String>) -> Result<Self, TypesError> {
                let s = raw.into();
                if s.trim().is_empty() {
                    return Err(TypesError::EmptyIdentifier);
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

string_id!(
    /// Identifies one election. Credentials and cloud ledgers are scoped to it.
    ElectionId
);
string_id!(
    /// Identifies one question (contest) within an election.
    QuestionId
);
string_id!(
    /// Identifies one cast ballot entry.
    VoteId
);
string_id!(
    /// Sender-chosen idempotency key for a sync batch.
    BatchId
);
string_id!(
    /// Edge node identifier, derived from the node's public key.
    NodeId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_blank() {
        assert_eq!(ElectionId::parse("  "), Err(TypesError::EmptyIdentifier));
        assert_eq!(ElectionId::parse("E1").unwrap().as_str(), "E1");
    }

    #[test]
    fn serde_is_transparent() {
        let id = BatchId::new("B1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"B1\"");
    }
}
