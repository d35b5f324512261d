use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("RSA key of {bits} bits is below the {min}-bit minimum for this policy")]
    KeyTooSmall { bits: usize, min: usize },

    #[error("key generation failed: {0}")]
    KeyGeneration(#[from] rsa::Error),

    #[error("invalid authority public key: {0}")]
    InvalidPublicKey(&'static str),

    #[error("value is not coprime to the modulus; blind again with a fresh factor")]
    NotCoprime,

    #[error("value is out of range for the modulus")]
    OutOfRange,

    #[error("signature does not verify against the authority key")]
    InvalidSignature,

    #[error("request is for election {got}, authority serves {expected}")]
    ElectionMismatch { expected: String, got: String },

    #[error("a credential was already issued to this voter for this election")]
    AlreadyIssued,

    #[error("credential was blinded under key {expected}, response used key {got}")]
    KeyMismatch { expected: String, got: String },
}
