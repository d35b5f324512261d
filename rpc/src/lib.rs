//! HTTP API for the edgevote cloud.
//!
//! Provides endpoints for:
//! - Edge-node registration, listing and status changes
//! - Vote sync batch intake
//! - Cloud ledger roots and inclusion proofs
//! - Prometheus metrics

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use server::{router, RpcServer};
