//! Blind-signature credential authority.
//!
//! Multiplicative RSA blinding: the voter blinds the credential message
//! with a fresh random `r`, the authority signs the blinded value without
//! learning the message, and the voter unblinds to obtain an ordinary RSA
//! signature on a message the authority has never seen.
//!
//! ```text
//! voter:     blinded   = m * r^e           mod n
//! authority: signed    = blinded^d         mod n
//! voter:     signature = signed * r^-1     mod n   (= m^d)
//! anyone:    signature^e == m              mod n
//! ```
//!
//! Credentials take `m = FDH(credential message)`.

pub mod blind;
pub mod credential;
mod encoding;
pub mod error;
pub mod issuer;
pub mod keys;

pub use blind::{
    blind, blind_fdh, full_domain_hash, sign, unblind, verify, verify_fdh, BlindSignature,
    BlindedMessage, BlindingFactor, CredentialSignature,
};
pub use credential::{
    credential_message, verify_nullifier_signature, BlindingState, Credential, IssuanceRequest,
    IssuanceResponse, SignedCredential,
};
pub use error::AuthorityError;
pub use issuer::CredentialAuthority;
pub use keys::{generate_keys, AuthorityKeyPair, AuthorityPublicKey, KeyPolicy};
