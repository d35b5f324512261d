//! Parsing errors for the wire representations of core types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("wrong length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("identifier must not be empty")]
    EmptyIdentifier,

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
