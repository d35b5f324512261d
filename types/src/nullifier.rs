//! Voter-chosen nullifiers.

use crate::hex_bytes::hex_newtype;
use std::fmt;

/// A 32-byte high-entropy value chosen by the voter client.
///
/// One nullifier maps to at most one accepted vote per
/// `(election, question)`. It must be unlinkable to the voter, so it is
/// generated client-side and only ever revealed blinded to the authority.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nullifier([u8; 32]);

impl Nullifier {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nullifier({}\u{2026})", hex::encode(&self.0[..4]))
    }
}

hex_newtype!(Nullifier, 32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_display_match() {
        let n = Nullifier::new([7u8; 32]);
        let parsed: Nullifier = n.to_string().parse().unwrap();
        assert_eq!(parsed, n);
    }

    #[test]
    fn debug_is_truncated() {
        let n = Nullifier::new([0xff; 32]);
        assert_eq!(format!("{:?}", n), "Nullifier(ffffffff\u{2026})");
    }
}
