//! Data models for batch verification
//!
//! This module provides the records held on each side of the protocol:
//! the on-chain record owned by the registry contract, the off-chain
//! document owned by the content store, and the registration request that
//! produces both.

mod document;
mod record;
mod registration;

pub use document::{DocumentFetchResult, OffChainDocument};
pub use record::OnChainRecord;
pub use registration::NewBatch;
