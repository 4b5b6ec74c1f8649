//! QR payload codec
//!
//! A batch QR code carries one of two payloads:
//!
//! - the batch hash, rendered as `0x` followed by 64 hex characters
//! - a JSON object with exactly `batchNumber`, `manufacturer` and
//!   `productionDate`
//!
//! Anything else is a [`CoreError::PayloadParse`], after which the caller is
//! expected to offer manual field entry.

use serde_json::{Map, Value};

use crate::error::{to_payload_error, CoreError, Result};
use crate::identifier::{BatchFields, BatchIdHash};

const BATCH_NUMBER: &str = "batchNumber";
const MANUFACTURER: &str = "manufacturer";
const PRODUCTION_DATE: &str = "productionDate";

/// Decoded QR payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrPayload {
    /// Batch hash, verified directly against the contract
    Hash(BatchIdHash),

    /// Identifier fields, verified and cross-checked against the document
    Fields(BatchFields),
}

impl QrPayload {
    /// Decode scanned or pasted payload text
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(to_payload_error("payload is empty"));
        }

        if BatchIdHash::is_hash_shaped(trimmed) {
            return Ok(QrPayload::Hash(trimmed.parse()?));
        }

        let value: Value = serde_json::from_str(trimmed).map_err(to_payload_error)?;
        let object = value
            .as_object()
            .ok_or_else(|| to_payload_error("payload is neither a batch hash nor a JSON object"))?;

        Ok(QrPayload::Fields(fields_from_object(object)?))
    }

    /// Render the payload as QR text
    pub fn encode(&self) -> String {
        match self {
            QrPayload::Hash(hash) => hash.to_string(),
            QrPayload::Fields(fields) => serde_json::json!({
                BATCH_NUMBER: fields.batch_number,
                MANUFACTURER: fields.manufacturer,
                PRODUCTION_DATE: fields.production_date,
            })
            .to_string(),
        }
    }
}

fn fields_from_object(object: &Map<String, Value>) -> Result<BatchFields> {
    if let Some(extra) = object
        .keys()
        .find(|k| ![BATCH_NUMBER, MANUFACTURER, PRODUCTION_DATE].contains(&k.as_str()))
    {
        return Err(to_payload_error(format!("unexpected field {:?}", extra)));
    }

    let batch_number = string_field(object, BATCH_NUMBER)?;
    let manufacturer = string_field(object, MANUFACTURER)?;
    let production_date = match object.get(PRODUCTION_DATE) {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            to_payload_error(format!("{} must be a non-negative integer", PRODUCTION_DATE))
        })?,
        Some(Value::String(s)) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().map_err(to_payload_error)?
        }
        Some(_) => {
            return Err(to_payload_error(format!(
                "{} must be unix seconds",
                PRODUCTION_DATE
            )))
        }
        None => return Err(missing(PRODUCTION_DATE)),
    };

    Ok(BatchFields {
        batch_number,
        manufacturer,
        production_date,
    })
}

fn string_field(object: &Map<String, Value>, name: &str) -> Result<String> {
    match object.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(to_payload_error(format!("{} must be a string", name))),
        None => Err(missing(name)),
    }
}

fn missing(name: &str) -> CoreError {
    to_payload_error(format!("missing field {}", name))
}
