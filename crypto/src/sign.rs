//! Ed25519 signing and verification.

use edgevote_types::{PrivateKey, PublicKey, Signature};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};

/// Sign a message with a node's private key.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Uses strict verification, so malleated signatures and small-order keys
/// are rejected. Malformed keys verify as `false`.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify_strict(message, &dalek_sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};

    #[test]
    fn sign_and_verify() {
        let kp = generate_keypair();
        let sig = sign_message(b"batch B1", &kp.private);
        assert!(verify_signature(b"batch B1", &sig, &kp.public));
    }

    #[test]
    fn tampered_message_fails() {
        let kp = generate_keypair();
        let sig = sign_message(b"batch B1", &kp.private);
        assert!(!verify_signature(b"batch B2", &sig, &kp.public));
    }

    #[test]
    fn other_key_fails() {
        let a = keypair_from_seed(&[1u8; 32]);
        let b = keypair_from_seed(&[2u8; 32]);
        let sig = sign_message(b"m", &a.private);
        assert!(!verify_signature(b"m", &sig, &b.public));
    }

    #[test]
    fn garbage_key_is_false_not_panic() {
        let kp = generate_keypair();
        let sig = sign_message(b"m", &kp.private);
        assert!(!verify_signature(b"m", &sig, &PublicKey([0xFF; 32])));
    }
}
