//! On-chain batch record
//!
//! Mirrors the `(bool, string, uint256, address, uint256)` tuple returned by
//! the registry contract's verify and lookup functions.

use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// Batch record as read from the registry contract
///
/// Owned by the contract; only ever held for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnChainRecord {
    /// Whether the contract knows the batch
    pub is_registered: bool,

    /// Content identifier of the off-chain document
    pub content_ref: String,

    /// Registration timestamp in unix seconds
    pub registered_at: u64,

    /// Manufacturer address bound at registration
    pub owner: Address,

    /// Number of verifications recorded by the contract
    pub verification_count: u64,
}

impl OnChainRecord {
    /// Record for a batch the contract does not know
    pub fn unregistered() -> Self {
        Self {
            is_registered: false,
            content_ref: String::new(),
            registered_at: 0,
            owner: Address::zero(),
            verification_count: 0,
        }
    }

    /// Content reference, if one was stored
    pub fn content_ref(&self) -> Option<&str> {
        if self.content_ref.is_empty() {
            None
        } else {
            Some(&self.content_ref)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_has_no_content_ref() {
        let record = OnChainRecord::unregistered();
        assert!(!record.is_registered);
        assert_eq!(record.content_ref(), None);
        assert_eq!(record.owner, Address::zero());
    }

    #[test]
    fn test_content_ref() {
        let record = OnChainRecord {
            is_registered: true,
            content_ref: "bafy123".to_string(),
            registered_at: 1_700_000_000,
            owner: Address::repeat_byte(0x11),
            verification_count: 3,
        };
        assert_eq!(record.content_ref(), Some("bafy123"));
    }
}
