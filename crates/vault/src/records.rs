//! Conversion between typed records and store fields.

use crate::error::{VaultError, VaultResult};
use docvault_storage::Fields;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub(crate) fn to_fields<T: Serialize>(value: &T) -> VaultResult<Fields> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(VaultError::InvalidInput(format!(
            "record must serialize to an object, got {other}"
        ))),
        Err(e) => Err(VaultError::InvalidInput(format!(
            "failed to serialize record: {e}"
        ))),
    }
}

/// Decode stored fields, attributing failures to `document_id`.
pub(crate) fn from_fields<T: DeserializeOwned>(
    document_id: &str,
    key: &str,
    fields: Fields,
) -> VaultResult<T> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| VaultError::corrupt(document_id, format!("record {key}: {e}")))
}
