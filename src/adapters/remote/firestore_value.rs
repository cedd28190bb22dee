//! Firestore REST value encoding.
//!
//! The REST API wraps every value in a typed envelope
//! (`{"stringValue": "x"}`, `{"mapValue": {"fields": {..}}}`, ...).
//! These helpers convert between that form and plain JSON.

use serde_json::{Map, Value, json};

use crate::ports::document_store::{Document, RemoteError};

pub fn encode_fields(fields: &Document) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            json!({ "integerValue": n.to_string() })
        }
        Value::Number(n) => json!({ "doubleValue": n.as_f64().unwrap_or(0.0) }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Decode a REST `fields` object. A missing object decodes as empty.
pub fn decode_fields(fields: Option<&Value>) -> Result<Document, RemoteError> {
    let Some(fields) = fields else {
        return Ok(Map::new());
    };
    let obj = fields
        .as_object()
        .ok_or_else(|| RemoteError::Malformed("document fields are not an object".to_string()))?;
    obj.iter()
        .map(|(k, v)| decode_value(v).map(|v| (k.clone(), v)))
        .collect()
}

pub fn decode_value(value: &Value) -> Result<Value, RemoteError> {
    let obj = value
        .as_object()
        .ok_or_else(|| RemoteError::Malformed(format!("untyped value: {value}")))?;
    let Some((tag, inner)) = obj.iter().next() else {
        return Err(RemoteError::Malformed("empty value envelope".to_string()));
    };

    match tag.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or(false))),
        "integerValue" => {
            // Integers arrive as strings to survive 64-bit range.
            let n = match inner {
                Value::String(s) => s
                    .parse::<i64>()
                    .map_err(|e| RemoteError::Malformed(format!("integerValue `{s}`: {e}")))?,
                other => other
                    .as_i64()
                    .ok_or_else(|| RemoteError::Malformed(format!("integerValue {other}")))?,
            };
            Ok(Value::from(n))
        }
        "doubleValue" => Ok(inner
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number)),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = inner.get("values").and_then(Value::as_array);
            values
                .map_or_else(|| Ok(Vec::new()), |vs| vs.iter().map(decode_value).collect())
                .map(Value::Array)
        }
        "mapValue" => decode_fields(inner.get("fields")).map(Value::Object),
        other => Err(RemoteError::Malformed(format!("unknown value type `{other}`"))),
    }
}
