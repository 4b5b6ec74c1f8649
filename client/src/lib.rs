//! Client library for the medicine batch registry
//!
//! This library connects the on-chain registry contract and the off-chain
//! document store. [`Registrar`] writes batches and allow-list entries,
//! [`Verifier`] answers authenticity queries.

pub mod config;
pub mod content_store;
pub mod contract;
pub mod error;
pub mod registrar;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ChainConfig, ClientConfig, ContentStoreConfig};
pub use content_store::{ContentStore, PinataStore};
pub use contract::{
    BatchRegistry, Connection, MedicineContract, NetworkInfo, SigningClient, TxConfirmation,
};
pub use error::{ClientError, Result};
pub use registrar::{PendingRegistration, RegistrationReceipt, Registrar};
pub use verifier::Verifier;
