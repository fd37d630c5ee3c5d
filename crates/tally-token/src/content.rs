//! Closed-field-set JSON decoding for entry content
//!
//! Entry content is decoded against a fixed set of keys. Unknown keys are an
//! error, and each recognized field is decoded on its own so a shape error
//! names the field it came from. Fields are held as raw JSON text until taken,
//! so free-form metadata keeps the exact text it was written with.

use crate::errors::ContentError;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use serde_json::Value;
use std::collections::BTreeMap;

/// Top-level fields of a content object, undecoded
pub(crate) type RawObject = BTreeMap<String, Box<RawValue>>;

/// Decode `content` as a JSON object whose keys are all in `fields`
pub(crate) fn decode_object(content: &[u8], fields: &[&str]) -> Result<RawObject, ContentError> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Err(ContentError::Empty);
    }
    let object: RawObject =
        serde_json::from_slice(content).map_err(|e| ContentError::Syntax(e.to_string()))?;
    if let Some(field) = object.keys().find(|key| !fields.contains(&key.as_str())) {
        return Err(ContentError::UnknownField {
            field: field.clone(),
        });
    }
    Ok(object)
}

/// Take and decode an optional field. JSON `null` counts as absent.
pub(crate) fn take_field<T: DeserializeOwned>(
    object: &mut RawObject,
    field: &'static str,
) -> Result<Option<T>, ContentError> {
    let Some(raw) = object.remove(field) else {
        return Ok(None);
    };
    let field_error = |e: serde_json::Error| ContentError::Field {
        field,
        message: e.to_string(),
    };
    match serde_json::from_str::<Value>(raw.get()).map_err(field_error)? {
        Value::Null => Ok(None),
        value => serde_json::from_value(value).map(Some).map_err(field_error),
    }
}

/// Take an optional free-form metadata field as the JSON text it was
/// written with
pub(crate) fn take_metadata(object: &mut RawObject) -> Option<String> {
    object
        .remove("metadata")
        .filter(|raw| raw.get() != "null")
        .map(|raw| raw.get().to_string())
}

/// Check metadata text for encoding. It must be a single JSON value other
/// than `null`, since `null` decodes as absent metadata.
pub(crate) fn raw_metadata(metadata: &str) -> Result<Box<RawValue>, String> {
    let raw = RawValue::from_string(metadata.trim().to_string()).map_err(|e| e.to_string())?;
    if raw.get() == "null" {
        return Err("must not be null".to_string());
    }
    Ok(raw)
}
