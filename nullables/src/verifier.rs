//! Nullable proof verifier: accepts every proof except scripted ones.

use edgevote_sync::{PublicInputs, ZkVerifier};
use edgevote_types::Blob;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct NullVerifier {
    reject: Mutex<HashSet<Vec<u8>>>,
    calls: AtomicU64,
}

impl NullVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `proof` fail verification from now on.
    pub fn reject(&self, proof: &Blob) {
        self.reject.lock().unwrap().insert(proof.as_bytes().to_vec());
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ZkVerifier for NullVerifier {
    fn verify_proof(&self, proof: &Blob, _inputs: &PublicInputs<'_>) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        !self.reject.lock().unwrap().contains(proof.as_bytes())
    }
}
