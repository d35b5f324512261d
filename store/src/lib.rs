//! Durable-storage traits for edgevote.
//!
//! Ledgers write overflowed entry bodies through [`EntryStore`] and the
//! cloud merge records first-write-wins nullifiers through
//! [`NullifierStore`]. The rest of the workspace depends only on the
//! traits; [`MemoryStore`] is the volatile backend used by tests and by a
//! daemon started without a database.

pub mod entry;
pub mod error;
pub mod memory;
pub mod nullifier;

pub use entry::{EntryStore, LedgerScope, StoredEntry};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use nullifier::{NullifierRecord, NullifierStore};

/// Everything a ledger or cloud merge needs from durable storage.
pub trait VoteStore: EntryStore + NullifierStore + Send + Sync {}

impl<T: EntryStore + NullifierStore + Send + Sync> VoteStore for T {}
