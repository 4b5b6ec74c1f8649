//! Error types for the medverify client
//!
//! Errors are split along the trust boundary. Configuration, wallet and
//! contract errors concern the chain of trust and are always surfaced.
//! Off-chain fetch errors only ever enrich a verdict and are downgraded by
//! the verifier into an unavailable document.

use medverify_core::CoreError;
use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error type for client operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or malformed configuration; fatal, not retried
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No signer available, or the node refused the connection
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// The signer rejected the request
    #[error("Request cancelled by signer: {0}")]
    Cancelled(String),

    /// The signer is not on the manufacturer allow-list
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Contract reverted or the node call failed; surfaced verbatim
    #[error("Contract call failed: {0}")]
    ContractCall(String),

    /// Content store upload failed
    #[error("Content store error: {0}")]
    ContentStore(String),

    /// Off-chain document could not be fetched
    #[error("Off-chain fetch failed: {0}")]
    OffChainFetch(String),

    /// Malformed QR or manual input
    #[error(transparent)]
    PayloadParse(#[from] CoreError),

    /// Batch fields rejected before anything is written
    #[error("Invalid batch: {0}")]
    InvalidInput(String),

    /// Checkpoints are not recorded on-chain
    #[error("Supply chain checkpoints moved off-chain; update the off-chain record instead")]
    CheckpointMovedOffChain,
}

impl ClientError {
    /// Whether the user can fix this by repeating the connect or approve action
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Wallet(_) | ClientError::Cancelled(_))
    }

    /// Whether the caller should fall back to manual field entry
    pub fn offers_manual_entry(&self) -> bool {
        matches!(self, ClientError::PayloadParse(e) if e.offers_manual_entry())
    }
}

/// Helper function to convert string errors to configuration errors
pub fn to_config_error<E: ToString>(err: E) -> ClientError {
    ClientError::Configuration(err.to_string())
}

impl From<config::ConfigError> for ClientError {
    fn from(err: config::ConfigError) -> Self {
        ClientError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ClientError::Wallet("no signer".to_string()).is_retryable());
        assert!(ClientError::Cancelled("user rejected".to_string()).is_retryable());
        assert!(!ClientError::ContractCall("revert".to_string()).is_retryable());
        assert!(!ClientError::Unauthorized("0xaa".to_string()).is_retryable());
        assert!(!to_config_error("missing contract address").is_retryable());
    }

    #[test]
    fn test_payload_errors_offer_manual_entry() {
        let err: ClientError = medverify_core::QrPayload::parse("nope").unwrap_err().into();
        assert!(err.offers_manual_entry());
        assert!(!ClientError::CheckpointMovedOffChain.offers_manual_entry());
        assert!(!ClientError::InvalidInput("empty batch".to_string()).offers_manual_entry());
    }

    #[test]
    fn test_checkpoint_message() {
        assert!(ClientError::CheckpointMovedOffChain
            .to_string()
            .contains("moved off-chain"));
    }
}
