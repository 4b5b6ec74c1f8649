//! Off-chain batch document
//!
//! The JSON document pinned to the content store at registration. Documents
//! are content-addressed, so a changed document is a new document with a new
//! content identifier; the on-chain record keeps pointing at the old one.

use serde::{Deserialize, Serialize};

use crate::identifier::BatchFields;

/// Descriptive batch data stored off-chain
///
/// Documents are written by many tools, so every field is read leniently:
/// absent or null fields default, numbers may arrive as strings, and
/// fractional dates are floored. A loosely typed field never makes the
/// whole document unreadable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OffChainDocument {
    /// Manufacturer display name
    #[serde(deserialize_with = "lenient::text")]
    pub manufacturer: String,

    /// Product name
    #[serde(deserialize_with = "lenient::text")]
    pub product_name: String,

    /// Production date in unix seconds
    #[serde(deserialize_with = "lenient::seconds")]
    pub production_date: u64,

    /// Expiry date in unix seconds, zero when the batch never expires
    #[serde(deserialize_with = "lenient::seconds")]
    pub expiry_date: u64,

    /// Batch number
    #[serde(deserialize_with = "lenient::text")]
    pub batch_number: String,

    /// Ordered distribution checkpoints
    #[serde(deserialize_with = "lenient::checkpoints")]
    pub distribution_path: Vec<String>,
}

/// Field readers that coerce loosely typed JSON values
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn scalar_text(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Null and containers read as empty text
    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_default())
    }

    /// Whole seconds not after `value`; negative and non-finite values are zero
    fn floor_seconds(value: f64) -> u64 {
        if value.is_finite() && value > 0.0 {
            // Saturates above u64::MAX
            value.floor() as u64
        } else {
            0
        }
    }

    fn parse_seconds(text: &str) -> u64 {
        text.parse::<u64>()
            .ok()
            .or_else(|| text.parse::<f64>().ok().map(floor_seconds))
            .unwrap_or(0)
    }

    /// Unix seconds from a number or numeric string; anything else is zero
    pub fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_u64().unwrap_or_else(|| n.as_f64().map_or(0, floor_seconds)),
            Value::String(s) => parse_seconds(s.trim()),
            Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => 0,
        })
    }

    /// A non-array reads as no checkpoints; null and nested entries are skipped
    pub fn checkpoints<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(entries) => entries.into_iter().filter_map(scalar_text).collect(),
            _ => Vec::new(),
        })
    }
}

impl OffChainDocument {
    /// Parse a document from a JSON body
    ///
    /// Anything other than a JSON object is rejected.
    pub fn from_json_slice(body: &[u8]) -> crate::Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(crate::error::CoreError::InvalidField(
                "off-chain document is not a JSON object".to_string(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The canonical identifier fields recorded in this document
    pub fn batch_fields(&self) -> BatchFields {
        BatchFields::new(
            self.batch_number.clone(),
            self.manufacturer.clone(),
            self.production_date,
        )
    }

    /// Copy of this document with one more checkpoint appended
    ///
    /// The copy must be pinned again and yields a new content identifier.
    pub fn with_checkpoint(&self, checkpoint: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.distribution_path.push(checkpoint.into());
        next
    }
}

/// Outcome of fetching an off-chain document
///
/// The fetcher reports what happened; the verdict evaluator decides how an
/// unavailable document affects the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFetchResult {
    /// The document was retrieved and parsed
    Found(OffChainDocument),

    /// The document could not be retrieved or parsed
    Unavailable {
        /// Why the fetch failed
        reason: String,
    },
}

impl DocumentFetchResult {
    /// Shorthand for an unavailable result
    pub fn unavailable(reason: impl Into<String>) -> Self {
        DocumentFetchResult::Unavailable {
            reason: reason.into(),
        }
    }

    /// The document, if one was found
    pub fn document(&self) -> Option<&OffChainDocument> {
        match self {
            DocumentFetchResult::Found(doc) => Some(doc),
            DocumentFetchResult::Unavailable { .. } => None,
        }
    }

    /// Whether a document was found
    pub fn is_found(&self) -> bool {
        matches!(self, DocumentFetchResult::Found(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let doc = OffChainDocument::from_json_slice(br#"{"manufacturer":"Acme"}"#).unwrap();
        assert_eq!(doc.manufacturer, "Acme");
        assert_eq!(doc.product_name, "");
        assert_eq!(doc.expiry_date, 0);
        assert!(doc.distribution_path.is_empty());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(OffChainDocument::from_json_slice(b"[1,2,3]").is_err());
        assert!(OffChainDocument::from_json_slice(b"<html>gateway error</html>").is_err());
    }

    #[test]
    fn test_numeric_strings_are_read_as_numbers() {
        let doc = OffChainDocument::from_json_slice(
            br#"{
                "manufacturer": "Acme",
                "productionDate": "1700000000",
                "expiryDate": " 1600000000 ",
                "batchNumber": 42
            }"#,
        )
        .unwrap();

        assert_eq!(doc.production_date, 1_700_000_000);
        assert_eq!(doc.expiry_date, 1_600_000_000);
        assert_eq!(doc.batch_number, "42");
    }

    #[test]
    fn test_null_fields_default() {
        let doc = OffChainDocument::from_json_slice(
            br#"{
                "manufacturer": null,
                "productName": null,
                "productionDate": null,
                "expiryDate": null,
                "batchNumber": null,
                "distributionPath": null
            }"#,
        )
        .unwrap();

        assert_eq!(doc, OffChainDocument::default());
    }

    #[test]
    fn test_fractional_dates_are_floored() {
        let doc = OffChainDocument::from_json_slice(
            br#"{"productionDate": 1700000000.0, "expiryDate": "1999999999.5"}"#,
        )
        .unwrap();
        assert_eq!(doc.production_date, 1_700_000_000);
        assert_eq!(doc.expiry_date, 1_999_999_999);

        let doc = OffChainDocument::from_json_slice(br#"{"expiryDate": 1999999999.5}"#).unwrap();
        assert_eq!(doc.expiry_date, 1_999_999_999);
    }

    #[test]
    fn test_unreadable_dates_are_zero() {
        let doc = OffChainDocument::from_json_slice(
            br#"{"productionDate": -5, "expiryDate": "next year"}"#,
        )
        .unwrap();
        assert_eq!(doc.production_date, 0);
        assert_eq!(doc.expiry_date, 0);

        let doc = OffChainDocument::from_json_slice(br#"{"expiryDate": [1999999999]}"#).unwrap();
        assert_eq!(doc.expiry_date, 0);
    }

    #[test]
    fn test_distribution_path_is_lenient() {
        let doc = OffChainDocument::from_json_slice(br#"{"distributionPath": "Warehouse A"}"#)
            .unwrap();
        assert!(doc.distribution_path.is_empty());

        let doc = OffChainDocument::from_json_slice(
            br#"{"distributionPath": ["Warehouse A", null, 7, {"site": "B"}]}"#,
        )
        .unwrap();
        assert_eq!(doc.distribution_path, vec!["Warehouse A", "7"]);
    }

    #[test]
    fn test_wire_format() {
        let doc = OffChainDocument {
            manufacturer: "Acme".to_string(),
            product_name: "Paracetamol 500mg".to_string(),
            production_date: 1000,
            expiry_date: 2000,
            batch_number: "B1".to_string(),
            distribution_path: vec![],
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["productName"], "Paracetamol 500mg");
        assert_eq!(json["distributionPath"], serde_json::json!([]));
        assert_eq!(doc.batch_fields(), BatchFields::new("B1", "Acme", 1000));
    }

    #[test]
    fn test_with_checkpoint_leaves_source_untouched() {
        let doc = OffChainDocument::default();
        let next = doc.with_checkpoint("Warehouse A").with_checkpoint("Pharmacy B");

        assert!(doc.distribution_path.is_empty());
        assert_eq!(next.distribution_path, vec!["Warehouse A", "Pharmacy B"]);
    }

    #[test]
    fn test_fetch_result_accessors() {
        let found = DocumentFetchResult::Found(OffChainDocument::default());
        let missing = DocumentFetchResult::unavailable("timeout");

        assert!(found.is_found());
        assert!(found.document().is_some());
        assert!(!missing.is_found());
        assert!(missing.document().is_none());
    }
}
