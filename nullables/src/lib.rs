//! Nullable infrastructure for deterministic testing.
//!
//! External collaborators (clock, durable storage, the proof verifier)
//! sit behind traits. This crate provides test-friendly implementations
//! that:
//! - return deterministic values
//! - can be controlled programmatically
//! - never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod store;
pub mod verifier;

pub use clock::NullClock;
pub use store::FaultyStore;
pub use verifier::NullVerifier;
