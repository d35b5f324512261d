//! Authority RSA key pairs.

use crate::encoding::biguint_hex;
use crate::AuthorityError;
use edgevote_crypto::blake2b_256_multi;
use num_bigint_dig::BigUint;
use num_integer::Integer;
use rand::rngs::OsRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Which key sizes an authority will accept.
///
/// Development keys generate quickly and exist for tests and local
/// tooling only. A production election refuses them outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPolicy {
    Production,
    Development,
}

impl KeyPolicy {
    pub fn min_bits(&self) -> usize {
        match self {
            Self::Production => 2048,
            Self::Development => 512,
        }
    }

    pub fn check(&self, bits: usize) -> Result<(), AuthorityError> {
        if bits < self.min_bits() {
            return Err(AuthorityError::KeyTooSmall {
                bits,
                min: self.min_bits(),
            });
        }
        Ok(())
    }
}

/// The authority's public verification key `(n, e)`, distributed to
/// voters and to every verifier.
///
/// Every value of this type has an odd modulus above 2 and an odd
/// exponent in `(1, n)`, whether built locally or deserialized.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "PublicKeyWire")]
pub struct AuthorityPublicKey {
    pub(crate) key_id: String,
    #[serde(with = "biguint_hex")]
    pub(crate) n: BigUint,
    #[serde(with = "biguint_hex")]
    pub(crate) e: BigUint,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyWire {
    key_id: String,
    #[serde(with = "biguint_hex")]
    n: BigUint,
    #[serde(with = "biguint_hex")]
    e: BigUint,
}

impl TryFrom<PublicKeyWire> for AuthorityPublicKey {
    type Error = AuthorityError;

    fn try_from(wire: PublicKeyWire) -> Result<Self, Self::Error> {
        let key = Self::new(wire.n, wire.e)?;
        if key.key_id != wire.key_id {
            return Err(AuthorityError::InvalidPublicKey("key id does not match (n, e)"));
        }
        Ok(key)
    }
}

impl AuthorityPublicKey {
    pub fn new(n: BigUint, e: BigUint) -> Result<Self, AuthorityError> {
        let two = BigUint::from(2u32);
        if n <= two || n.is_even() {
            return Err(AuthorityError::InvalidPublicKey("modulus must be odd and greater than 2"));
        }
        if e < BigUint::from(3u32) || e >= n || e.is_even() {
            return Err(AuthorityError::InvalidPublicKey("exponent must be odd and in (1, n)"));
        }
        let key_id = derive_key_id(&n, &e);
        Ok(Self { key_id, n, e })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    pub fn exponent(&self) -> &BigUint {
        &self.e
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.n.bits()
    }

    /// Modulus size in bytes; signatures are padded to this width.
    pub fn byte_len(&self) -> usize {
        (self.bits() + 7) / 8
    }
}

impl fmt::Debug for AuthorityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorityPublicKey({}, {} bits)", self.key_id, self.bits())
    }
}

/// Public key plus the private exponent `d`.
///
/// `d` never leaves the authority process: the type is neither `Clone`
/// nor `Serialize`, and `d` is zeroized on drop.
pub struct AuthorityKeyPair {
    public: AuthorityPublicKey,
    d: BigUint,
}

impl AuthorityKeyPair {
    /// Assemble a key pair from components. `e * d` must be `1` modulo
    /// `lambda(n)`; this is not checked here.
    pub fn from_components(n: BigUint, e: BigUint, d: BigUint) -> Result<Self, AuthorityError> {
        Ok(Self {
            public: AuthorityPublicKey::new(n, e)?,
            d,
        })
    }

    pub fn public(&self) -> &AuthorityPublicKey {
        &self.public
    }

    pub fn key_id(&self) -> &str {
        &self.public.key_id
    }

    pub(crate) fn private_exponent(&self) -> &BigUint {
        &self.d
    }
}

impl Drop for AuthorityKeyPair {
    fn drop(&mut self) {
        self.d.zeroize();
    }
}

impl fmt::Debug for AuthorityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Generate a fresh election key pair with `e = 65537`.
///
/// Sizes below 512 bits are refused regardless of policy; callers apply
/// their [`KeyPolicy`] on top.
pub fn generate_keys(bits: usize) -> Result<AuthorityKeyPair, AuthorityError> {
    KeyPolicy::Development.check(bits)?;
    let private = RsaPrivateKey::new(&mut OsRng, bits)?;
    let keys = AuthorityKeyPair::from_components(
        private.n().clone(),
        private.e().clone(),
        private.d().clone(),
    )?;
    if bits < KeyPolicy::Production.min_bits() {
        tracing::warn!(key_id = %keys.key_id(), bits, "generated development-size authority key");
    } else {
        tracing::info!(key_id = %keys.key_id(), bits, "generated authority key");
    }
    Ok(keys)
}

fn derive_key_id(n: &BigUint, e: &BigUint) -> String {
    let n_bytes = n.to_bytes_be();
    let e_bytes = e.to_bytes_be();
    let digest = blake2b_256_multi(&[
        b"edgevote/authority-key/v1",
        &(n_bytes.len() as u64).to_be_bytes(),
        &n_bytes,
        &e_bytes,
    ]);
    hex::encode(&digest[..8])
}

#[cfg(test)]
pub(crate) mod test_keys {
    use super::*;
    use std::sync::OnceLock;

    /// One shared development key; RSA generation dominates test time.
    pub fn dev_keys() -> &'static AuthorityKeyPair {
        static KEYS: OnceLock<AuthorityKeyPair> = OnceLock::new();
        KEYS.get_or_init(|| generate_keys(1024).expect("keygen"))
    }
}

#[cfg(test)]
mod tests {
    use super::test_keys::dev_keys;
    use super::*;

    #[test]
    fn production_policy_refuses_small_keys() {
        let err = KeyPolicy::Production.check(1024).unwrap_err();
        assert!(matches!(
            err,
            AuthorityError::KeyTooSmall {
                bits: 1024,
                min: 2048
            }
        ));
        assert!(KeyPolicy::Production.check(2048).is_ok());
    }

    #[test]
    fn tiny_keys_are_refused_outright() {
        assert!(matches!(
            generate_keys(256),
            Err(AuthorityError::KeyTooSmall { .. })
        ));
    }

    #[test]
    fn generated_key_has_requested_size() {
        let keys = dev_keys();
        assert_eq!(keys.public().bits(), 1024);
        assert_eq!(keys.public().e, BigUint::from(65_537u32));
        assert_eq!(keys.key_id().len(), 16);
    }

    #[test]
    fn public_key_serializes_without_private_exponent() {
        let json = serde_json::to_value(dev_keys().public()).unwrap();
        assert!(json.get("keyId").is_some());
        assert!(json.get("n").is_some());
        assert!(json.get("d").is_none());
        let back: AuthorityPublicKey = serde_json::from_value(json).unwrap();
        assert_eq!(&back, dev_keys().public());
    }

    #[test]
    fn key_id_depends_on_modulus() {
        let a = AuthorityPublicKey::new(BigUint::from(3233u32), BigUint::from(17u32)).unwrap();
        let b = AuthorityPublicKey::new(BigUint::from(3127u32), BigUint::from(17u32)).unwrap();
        assert_ne!(a.key_id, b.key_id);
    }

    #[test]
    fn degenerate_keys_are_refused() {
        let n = |v: u32| BigUint::from(v);
        for (modulus, exponent) in [(0, 3), (1, 3), (2, 3), (3233, 1), (3233, 4), (3233, 3233), (3234, 17)] {
            assert!(
                matches!(
                    AuthorityPublicKey::new(n(modulus), n(exponent)),
                    Err(AuthorityError::InvalidPublicKey(_))
                ),
                "({modulus}, {exponent}) accepted"
            );
        }
    }

    #[test]
    fn degenerate_keys_do_not_deserialize() {
        for json in [
            serde_json::json!({"keyId": "00", "n": "", "e": "03"}),
            serde_json::json!({"keyId": "00", "n": "02", "e": "03"}),
            serde_json::json!({"keyId": "00", "n": "0ca1", "e": "00"}),
        ] {
            assert!(serde_json::from_value::<AuthorityPublicKey>(json).is_err());
        }

        let mut json = serde_json::to_value(dev_keys().public()).unwrap();
        json["keyId"] = "0000000000000000".into();
        assert!(serde_json::from_value::<AuthorityPublicKey>(json).is_err());
    }
}
