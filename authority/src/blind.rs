//! Multiplicative RSA blinding.
//!
//! [`blind`], [`sign`], [`unblind`] and [`verify`] work on the message as
//! an integer mod `n`: `verify` checks `signature^e == message mod n`.
//! Credentials sign byte strings through [`blind_fdh`] and [`verify_fdh`],
//! which first expand the bytes with [`full_domain_hash`] so the signed
//! integer covers the whole modulus.

use crate::encoding::biguint_hex;
use crate::keys::{AuthorityKeyPair, AuthorityPublicKey};
use crate::AuthorityError;
use num_bigint_dig::{BigInt, BigUint, ModInverse, RandBigInt, Sign, ToBigUint};
use num_integer::Integer;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroize;

const FDH_DOMAIN: &[u8] = b"edgevote/fdh/v1";

/// A blinded credential message, the only form the authority ever sees.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlindedMessage(#[serde(with = "biguint_hex")] pub(crate) BigUint);

/// The authority's signature over a [`BlindedMessage`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlindSignature(#[serde(with = "biguint_hex")] pub(crate) BigUint);

/// An unblinded signature: `message^d mod n`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialSignature(#[serde(with = "biguint_hex")] pub(crate) BigUint);

/// The voter's secret blinding factor `r`.
///
/// Single use: consumed by [`unblind`] and zeroized on drop. Reusing `r`
/// across credentials would make them linkable.
pub struct BlindingFactor(BigUint);

impl Drop for BlindingFactor {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for BlindingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlindingFactor(..)")
    }
}

macro_rules! debug_as_hex_prefix {
    ($name:ident) => {
        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let hex = hex::encode(self.0.to_bytes_be());
                write!(f, "{}({}\u{2026})", stringify!($name), &hex[..hex.len().min(8)])
            }
        }
    };
}

debug_as_hex_prefix!(BlindedMessage);
debug_as_hex_prefix!(BlindSignature);
debug_as_hex_prefix!(CredentialSignature);

impl CredentialSignature {
    /// Big-endian bytes left-padded to the modulus width.
    pub fn to_bytes(&self, public_key: &AuthorityPublicKey) -> Vec<u8> {
        let raw = self.0.to_bytes_be();
        let width = public_key.byte_len().max(raw.len());
        let mut out = vec![0u8; width - raw.len()];
        out.extend_from_slice(&raw);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }
}

/// Expand `message` to the modulus width with SHA-256 in counter mode and
/// reduce mod `n`.
pub fn full_domain_hash(message: &[u8], public_key: &AuthorityPublicKey) -> BigUint {
    let width = public_key.byte_len();
    let mut out = Vec::with_capacity(width + 32);
    let mut counter: u32 = 0;
    while out.len() < width {
        let mut hasher = Sha256::new();
        hasher.update(FDH_DOMAIN);
        hasher.update(counter.to_be_bytes());
        hasher.update(message);
        out.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    out.truncate(width);
    BigUint::from_bytes_be(&out) % &public_key.n
}

fn is_unit_mod(value: &BigUint, n: &BigUint) -> bool {
    let zero = BigUint::from(0u32);
    value > &zero && value < n && value.gcd(n) == BigUint::from(1u32)
}

fn inverse_mod(value: &BigUint, n: &BigUint) -> Option<BigUint> {
    let inv = value.mod_inverse(n)?;
    let inv = if inv.sign() == Sign::Minus {
        inv + BigInt::from_biguint(Sign::Plus, n.clone())
    } else {
        inv
    };
    inv.to_biguint()
}

/// Blind `message` for `public_key`: `message * r^e mod n`.
///
/// Draws `r` uniformly from `[2, n)` with the OS CSPRNG, redrawing until
/// `gcd(r, n) = 1`. The range is never empty because a valid public key
/// has `n > 2`.
pub fn blind(message: &BigUint, public_key: &AuthorityPublicKey) -> (BlindedMessage, BlindingFactor) {
    let n = &public_key.n;
    let m = message % n;
    let low = BigUint::from(2u32);
    let r = loop {
        let candidate = OsRng.gen_biguint_range(&low, n);
        if is_unit_mod(&candidate, n) {
            break candidate;
        }
    };
    let blinded = (m * r.modpow(&public_key.e, n)) % n;
    (BlindedMessage(blinded), BlindingFactor(r))
}

/// Authority side: sign a blinded value with the private exponent.
///
/// Fails with [`AuthorityError::NotCoprime`] when the blinded value shares
/// a factor with `n`; the voter should blind again with a fresh `r`.
pub fn sign(blinded: &BlindedMessage, keys: &AuthorityKeyPair) -> Result<BlindSignature, AuthorityError> {
    let n = &keys.public().n;
    if blinded.0 >= *n {
        return Err(AuthorityError::OutOfRange);
    }
    if !is_unit_mod(&blinded.0, n) {
        return Err(AuthorityError::NotCoprime);
    }
    Ok(BlindSignature(blinded.0.modpow(keys.private_exponent(), n)))
}

/// Voter side: remove the blinding factor.
pub fn unblind(
    signed: &BlindSignature,
    r: BlindingFactor,
    public_key: &AuthorityPublicKey,
) -> Result<CredentialSignature, AuthorityError> {
    let n = &public_key.n;
    if signed.0 >= *n {
        return Err(AuthorityError::OutOfRange);
    }
    let r_inv = inverse_mod(&r.0, n).ok_or(AuthorityError::NotCoprime)?;
    Ok(CredentialSignature((&signed.0 * r_inv) % n))
}

/// Check `signature^e == message mod n`.
///
/// Signatures outside `[1, n)` are refused: [`sign`] never produces them.
pub fn verify(message: &BigUint, signature: &CredentialSignature, public_key: &AuthorityPublicKey) -> bool {
    let n = &public_key.n;
    if signature.0 >= *n || signature.0 == BigUint::from(0u32) {
        return false;
    }
    signature.0.modpow(&public_key.e, n) == message % n
}

/// [`blind`] applied to `FDH(message)`.
pub fn blind_fdh(message: &[u8], public_key: &AuthorityPublicKey) -> (BlindedMessage, BlindingFactor) {
    blind(&full_domain_hash(message, public_key), public_key)
}

/// [`verify`] against `FDH(message)`.
pub fn verify_fdh(message: &[u8], signature: &CredentialSignature, public_key: &AuthorityPublicKey) -> bool {
    verify(&full_domain_hash(message, public_key), signature, public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::test_keys::dev_keys;

    fn round_trip(message: &[u8]) -> CredentialSignature {
        let keys = dev_keys();
        let (blinded, r) = blind_fdh(message, keys.public());
        let signed = sign(&blinded, keys).unwrap();
        unblind(&signed, r, keys.public()).unwrap()
    }

    #[test]
    fn blind_sign_unblind_verifies() {
        let sig = round_trip(b"credential message");
        assert!(verify_fdh(b"credential message", &sig, dev_keys().public()));
    }

    #[test]
    fn textbook_key_follows_the_formulas() {
        // n = 61 * 53, e = 17, d = 2753.
        let keys = AuthorityKeyPair::from_components(
            BigUint::from(3233u32),
            BigUint::from(17u32),
            BigUint::from(2753u32),
        )
        .unwrap();
        let pk = keys.public();
        let message = BigUint::from(65u32);

        let (blinded, r) = blind(&message, pk);
        let r_value = r.0.clone();
        assert_eq!(
            blinded.0,
            (&message * r_value.modpow(&pk.e, &pk.n)) % &pk.n
        );
        let signed = sign(&blinded, &keys).unwrap();
        let signature = unblind(&signed, r, pk).unwrap();
        assert_eq!(signature.0, message.modpow(keys.private_exponent(), &pk.n));
        assert_eq!(signature.0.modpow(&pk.e, &pk.n), message);
        assert!(verify(&message, &signature, pk));
        assert!(verify(&(&message + &pk.n), &signature, pk));
        assert!(!verify(&BigUint::from(66u32), &signature, pk));
    }

    #[test]
    fn unblinded_signature_equals_direct_signature() {
        let keys = dev_keys();
        let m = full_domain_hash(b"msg", keys.public());
        let direct = m.modpow(keys.private_exponent(), &keys.public().n);
        assert_eq!(round_trip(b"msg").0, direct);
        assert!(verify(&m, &CredentialSignature(direct), keys.public()));
    }

    #[test]
    fn same_message_blinds_differently_each_time() {
        let keys = dev_keys();
        let (a, _) = blind_fdh(b"same", keys.public());
        let (b, _) = blind_fdh(b"same", keys.public());
        assert_ne!(a, b);
        assert_ne!(a.0, full_domain_hash(b"same", keys.public()));
    }

    #[test]
    fn signature_on_other_message_fails() {
        let sig = round_trip(b"message one");
        assert!(!verify_fdh(b"message two", &sig, dev_keys().public()));
    }

    #[test]
    fn forged_signatures_fail() {
        let pk = dev_keys().public();
        assert!(!verify_fdh(b"m", &CredentialSignature(BigUint::from(0u32)), pk));
        assert!(!verify_fdh(b"m", &CredentialSignature(BigUint::from(1u32)), pk));
        assert!(!verify_fdh(b"m", &CredentialSignature(pk.n.clone()), pk));
        let h = full_domain_hash(b"m", pk);
        assert!(!verify_fdh(b"m", &CredentialSignature(h), pk));
    }

    #[test]
    fn sign_rejects_non_units() {
        let keys = dev_keys();
        let zero = BlindedMessage(BigUint::from(0u32));
        assert!(matches!(sign(&zero, keys), Err(AuthorityError::NotCoprime)));
        let too_big = BlindedMessage(keys.public().n.clone());
        assert!(matches!(sign(&too_big, keys), Err(AuthorityError::OutOfRange)));
    }

    #[test]
    fn signature_bytes_are_modulus_width() {
        let sig = round_trip(b"width");
        let bytes = sig.to_bytes(dev_keys().public());
        assert_eq!(bytes.len(), 128);
        assert_eq!(CredentialSignature::from_bytes(&bytes), sig);
    }
}
