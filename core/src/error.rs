//! Error types for the core crate
//!
//! This module provides a consolidated error type for the core crate,
//! covering malformed payloads and invalid batch fields.

use thiserror::Error;

/// Hint appended to payload errors so callers can offer manual entry
pub const MANUAL_ENTRY_HINT: &str =
    "enter the batch number, manufacturer and production date manually";

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// QR or manual payload could not be understood
    #[error("Invalid payload: {0}; expected a 0x-prefixed batch hash or JSON with batchNumber, manufacturer, productionDate")]
    PayloadParse(String),

    /// A batch field failed validation
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Hex decoding error
    #[error("Hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),
}

impl CoreError {
    /// Whether the caller should fall back to manual field entry
    pub fn offers_manual_entry(&self) -> bool {
        matches!(self, CoreError::PayloadParse(_))
    }
}

/// Result type for the core crate
pub type Result<T> = std::result::Result<T, CoreError>;

/// Convert any displayable error to a PayloadParse error
pub fn to_payload_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::PayloadParse(err.to_string())
}
