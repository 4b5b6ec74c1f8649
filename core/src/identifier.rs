//! Batch identifier derivation
//!
//! A batch is identified on-chain by the keccak-256 digest of a canonical
//! string built from three fields: manufacturer name, batch number and
//! production date (unix seconds), joined with `|` in that order. No case or
//! whitespace normalization is applied, so `"Acme "` and `"Acme"` name two
//! different batches.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto;
use crate::error::{CoreError, Result};

/// Separator between the canonical identifier fields
pub const FIELD_DELIMITER: char = '|';

/// Length of a rendered batch hash: `0x` plus 64 hex characters
pub const HASH_STRING_LEN: usize = 66;

/// The three canonical fields a batch identifier is derived from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFields {
    /// Batch number as printed on the package
    pub batch_number: String,

    /// Manufacturer display name
    pub manufacturer: String,

    /// Production date in unix seconds
    pub production_date: u64,
}

impl BatchFields {
    /// Create a new field triple
    pub fn new(
        batch_number: impl Into<String>,
        manufacturer: impl Into<String>,
        production_date: u64,
    ) -> Self {
        Self {
            batch_number: batch_number.into(),
            manufacturer: manufacturer.into(),
            production_date,
        }
    }

    /// Derive the canonical batch identifier for these fields
    pub fn batch_id(&self) -> BatchId {
        BatchId::derive(&self.batch_number, &self.manufacturer, self.production_date)
    }

    /// Check that every field is present
    ///
    /// Only emptiness is rejected; the values are otherwise taken verbatim.
    pub fn validate(&self) -> Result<()> {
        if self.batch_number.is_empty() {
            return Err(CoreError::InvalidField("batch number is empty".to_string()));
        }
        if self.manufacturer.is_empty() {
            return Err(CoreError::InvalidField("manufacturer is empty".to_string()));
        }
        if self.production_date == 0 {
            return Err(CoreError::InvalidField("production date is zero".to_string()));
        }
        Ok(())
    }
}

/// Canonical batch identifier string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// Derive the identifier from its three canonical fields
    pub fn derive(batch_number: &str, manufacturer: &str, production_date: u64) -> Self {
        BatchId(format!(
            "{manufacturer}{d}{batch_number}{d}{production_date}",
            d = FIELD_DELIMITER
        ))
    }

    /// The identifier as passed to the contract
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Keccak-256 digest of the identifier, the contract's storage key
    pub fn hash(&self) -> BatchIdHash {
        BatchIdHash(crypto::keccak256(self.0.as_bytes()))
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 32-byte batch identifier digest
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchIdHash([u8; 32]);

impl BatchIdHash {
    /// Wrap raw digest bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        BatchIdHash(bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether `text` has the shape of a rendered batch hash
    pub fn is_hash_shaped(text: &str) -> bool {
        text.len() == HASH_STRING_LEN
            && text.starts_with("0x")
            && text[2..].bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Constant-time comparison against another digest
    pub fn matches(&self, other: &BatchIdHash) -> bool {
        crypto::digests_equal(&self.0, &other.0)
    }
}

impl From<[u8; 32]> for BatchIdHash {
    fn from(bytes: [u8; 32]) -> Self {
        BatchIdHash(bytes)
    }
}

impl From<BatchIdHash> for [u8; 32] {
    fn from(hash: BatchIdHash) -> Self {
        hash.0
    }
}

impl FromStr for BatchIdHash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        if !Self::is_hash_shaped(s) {
            return Err(CoreError::InvalidField(format!(
                "batch hash must be 0x followed by 64 hex characters, got {:?}",
                s
            )));
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&s[2..], &mut bytes)?;
        Ok(BatchIdHash(bytes))
    }
}

impl fmt::Display for BatchIdHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BatchIdHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BatchIdHash({})", self)
    }
}

impl Serialize for BatchIdHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BatchIdHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
