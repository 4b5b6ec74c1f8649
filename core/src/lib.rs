//! # medverify core
//!
//! Protocol logic for pharmaceutical batch verification: batch identifier
//! derivation, the on-chain and off-chain data models, the QR payload codec
//! and verdict evaluation. Nothing in this crate performs I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod crypto;
pub mod error;
pub mod identifier;
pub mod models;
pub mod qr;
pub mod verdict;

/// Re-export common types for ease of use
pub use error::{CoreError, Result};
pub use identifier::{BatchFields, BatchId, BatchIdHash};
pub use models::{DocumentFetchResult, NewBatch, OffChainDocument, OnChainRecord};
pub use qr::QrPayload;
pub use verdict::{BatchDetails, VerificationVerdict};

/// Version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current time in unix seconds
///
/// Clamps to zero if the system clock reads before the epoch.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
