//! Verification verdicts
//!
//! A verdict is computed fresh for every query from three inputs: the
//! on-chain record, the result of fetching the off-chain document, and the
//! fields the caller presented (if any). The on-chain record is the trust
//! anchor; the off-chain document only enriches and cross-checks it.

use ethers::types::Address;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::identifier::BatchFields;
use crate::models::{DocumentFetchResult, OnChainRecord};

/// Merged view of a batch from both stores
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDetails {
    /// Manufacturer display name (off-chain)
    pub manufacturer: String,

    /// Product name (off-chain)
    pub product_name: String,

    /// Production date in unix seconds (off-chain)
    pub production_date: u64,

    /// Expiry date in unix seconds (off-chain), zero for none
    pub expiry_date: u64,

    /// Batch number (off-chain)
    pub batch_number: String,

    /// Distribution checkpoints (off-chain)
    pub checkpoints: Vec<String>,

    /// Verification counter (on-chain)
    pub verification_count: u64,

    /// Whether the contract knows the batch (on-chain)
    pub is_registered: bool,

    /// Registration timestamp (on-chain)
    pub registered_at: u64,

    /// Owner address bound at registration (on-chain)
    pub owner: Address,

    /// Content identifier of the off-chain document (on-chain)
    pub content_ref: String,

    /// Whether the off-chain document could be read
    pub document_available: bool,
}

impl BatchDetails {
    /// Merge an on-chain record with an off-chain fetch result
    ///
    /// Descriptive fields stay blank when the document is unavailable.
    pub fn merge(record: &OnChainRecord, fetched: &DocumentFetchResult) -> Self {
        if !record.is_registered {
            return Self::default();
        }

        let mut details = BatchDetails {
            verification_count: record.verification_count,
            is_registered: true,
            registered_at: record.registered_at,
            owner: record.owner,
            content_ref: record.content_ref.clone(),
            ..Default::default()
        };

        if let Some(doc) = fetched.document() {
            details.manufacturer = doc.manufacturer.clone();
            details.product_name = doc.product_name.clone();
            details.production_date = doc.production_date;
            details.expiry_date = doc.expiry_date;
            details.batch_number = doc.batch_number.clone();
            details.checkpoints = doc.distribution_path.clone();
            details.document_available = true;
        }

        details
    }
}

/// Authenticity, match and expiry judgment for one query
///
/// The three signals are kept apart so callers can tell why a batch failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationVerdict {
    /// The contract holds a record for the batch
    pub is_registered: bool,

    /// The off-chain document agrees with the presented fields
    pub fields_match: bool,

    /// The batch is past its expiry date
    pub is_expired: bool,

    /// Merged batch details
    pub details: BatchDetails,
}

impl VerificationVerdict {
    /// Verdict for a batch the contract does not know
    pub fn not_registered() -> Self {
        Self {
            is_registered: false,
            fields_match: false,
            is_expired: false,
            details: BatchDetails::default(),
        }
    }

    /// Registered, matching and not expired
    pub fn is_authentic(&self) -> bool {
        self.is_registered && self.fields_match && !self.is_expired
    }

    /// One-line human summary
    pub fn summary(&self) -> &'static str {
        if !self.is_registered {
            "Not registered: this batch is unknown to the registry"
        } else if !self.fields_match {
            "Mismatch: the stored batch data differs from the presented fields"
        } else if self.is_expired {
            "Expired: the batch is registered but past its expiry date"
        } else {
            "Authentic: the batch is registered and the data matches"
        }
    }
}

/// Whether a batch with `expiry_date` is expired at `now`
///
/// A zero expiry never expires; an expiry equal to `now` is still valid.
pub fn is_expired(expiry_date: u64, now: u64) -> bool {
    expiry_date > 0 && expiry_date < now
}

/// Whether a fetched document agrees with the presented fields
///
/// Vacuously true when nothing was presented or no document was found.
pub fn fields_match(fetched: &DocumentFetchResult, presented: Option<&BatchFields>) -> bool {
    match (fetched.document(), presented) {
        (Some(doc), Some(fields)) => {
            doc.manufacturer == fields.manufacturer
                && doc.batch_number == fields.batch_number
                && doc.production_date == fields.production_date
        }
        _ => true,
    }
}

/// Compute a verdict
///
/// # Arguments
///
/// * `record` - On-chain record for the batch
/// * `fetched` - Result of fetching the off-chain document
/// * `presented` - Fields the caller presented, `None` when verifying by hash
/// * `now` - Evaluation time in unix seconds
pub fn evaluate(
    record: &OnChainRecord,
    fetched: &DocumentFetchResult,
    presented: Option<&BatchFields>,
    now: u64,
) -> VerificationVerdict {
    if !record.is_registered {
        return VerificationVerdict::not_registered();
    }

    if let DocumentFetchResult::Unavailable { reason } = fetched {
        debug!("Evaluating {} without its off-chain document: {}", record.content_ref, reason);
    }

    let details = BatchDetails::merge(record, fetched);
    VerificationVerdict {
        is_registered: true,
        fields_match: fields_match(fetched, presented),
        is_expired: is_expired(details.expiry_date, now),
        details,
    }
}
