//! Batch registration request

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::identifier::BatchFields;
use crate::models::OffChainDocument;

/// Data a manufacturer supplies to register a batch
///
/// The signer's address is bound as the on-chain owner by the client; it is
/// not part of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBatch {
    /// Manufacturer display name, stored off-chain and in the identifier
    pub manufacturer: String,

    /// Product name
    pub product_name: String,

    /// Production date in unix seconds
    pub production_date: u64,

    /// Expiry date in unix seconds, zero for none
    pub expiry_date: u64,

    /// Batch number
    pub batch_number: String,
}

impl NewBatch {
    /// The identifier fields of this batch
    pub fn batch_fields(&self) -> BatchFields {
        BatchFields::new(
            self.batch_number.clone(),
            self.manufacturer.clone(),
            self.production_date,
        )
    }

    /// Build the document that is pinned off-chain
    pub fn to_document(&self) -> OffChainDocument {
        OffChainDocument {
            manufacturer: self.manufacturer.clone(),
            product_name: self.product_name.clone(),
            production_date: self.production_date,
            expiry_date: self.expiry_date,
            batch_number: self.batch_number.clone(),
            distribution_path: Vec::new(),
        }
    }

    /// Reject requests that cannot produce a usable record
    pub fn validate(&self) -> Result<()> {
        self.batch_fields().validate()?;
        if self.expiry_date != 0 && self.expiry_date < self.production_date {
            return Err(CoreError::InvalidField(
                "expiry date precedes production date".to_string(),
            ));
        }
        Ok(())
    }
}
