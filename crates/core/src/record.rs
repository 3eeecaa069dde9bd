//! JSON record helpers.
//!
//! Backend rows are handled as flat JSON objects. Nested values (line items,
//! metadata blobs) are opaque: they are compared as whole values and never
//! diffed recursively.

use serde_json::{Map, Value};

use crate::error::{DomainError, DomainResult};

/// A backend row: top-level field name to JSON value.
pub type Record = Map<String, Value>;

/// Interpret a JSON value as a record.
///
/// `null` is treated as the empty record (e.g. a create has no original).
pub fn record_from_value(value: Value) -> DomainResult<Record> {
    match value {
        Value::Null => Ok(Record::new()),
        Value::Object(map) => Ok(map),
        other => Err(DomainError::validation(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

/// Overlay `patch` on top of `base`, field by field.
///
/// Used to turn a partial update payload into the full local-proposed record.
pub fn overlay(base: &Record, patch: &Record) -> Record {
    let mut out = base.clone();
    for (field, value) in patch {
        out.insert(field.clone(), value.clone());
    }
    out
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_is_an_empty_record() {
        assert!(record_from_value(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn non_objects_are_rejected() {
        let err = record_from_value(json!([1, 2])).unwrap_err();
        assert_eq!(err, DomainError::validation("expected a JSON object, found array"));
    }

    #[test]
    fn overlay_replaces_only_patched_fields() {
        let base = record_from_value(json!({"qty": 5, "status": "open"})).unwrap();
        let patch = record_from_value(json!({"qty": 10})).unwrap();

        let merged = overlay(&base, &patch);
        assert_eq!(Value::Object(merged), json!({"qty": 10, "status": "open"}));
    }
}
