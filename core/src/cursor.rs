//! [`Cursor`] — opaque keyset-pagination position (§6.2).
//!
//! A cursor is base64-url-safe-encoded JSON of `{ values, pointsToNext }`.
//! The grammar never inspects cursors; only the Builder encodes/decodes
//! them when compiling `cursorPaginate`'s keyset constraint.

use crate::error::{LihtneError, Result};
use crate::value::Value;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::collections::BTreeMap;

/// A JSON-serialisable mirror of [`Value`]'s scalar variants — cursors only
/// ever carry order-column values, never `Raw`/`Sub`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value")]
enum CursorValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(String),
}

impl TryFrom<&Value> for CursorValue {
    type Error = LihtneError;

    fn try_from(v: &Value) -> Result<Self> {
        Ok(match v {
            Value::Null => CursorValue::Null,
            Value::Bool(b) => CursorValue::Bool(*b),
            Value::Int(i) => CursorValue::Int(*i),
            Value::Float(f) => CursorValue::Float(*f),
            Value::Str(s) => CursorValue::Str(s.clone()),
            Value::DateTime(s) => CursorValue::DateTime(s.clone()),
            Value::Bytes(_) | Value::Raw(_) | Value::Sub(_) => {
                return Err(LihtneError::invalid_argument(
                    "cursor values must be scalar (no raw/sub/bytes)",
                ))
            }
        })
    }
}

impl From<CursorValue> for Value {
    fn from(v: CursorValue) -> Self {
        match v {
            CursorValue::Null => Value::Null,
            CursorValue::Bool(b) => Value::Bool(b),
            CursorValue::Int(i) => Value::Int(i),
            CursorValue::Float(f) => Value::Float(f),
            CursorValue::Str(s) => Value::Str(s),
            CursorValue::DateTime(s) => Value::DateTime(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct CursorPayload {
    values: BTreeMap<String, CursorValue>,
    points_to_next: bool,
}

/// A decoded keyset position: the order-column values of the last row seen,
/// and whether it points at the next page (`true`) or the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub values: BTreeMap<String, Value>,
    pub points_to_next: bool,
}

impl Cursor {
    pub fn new(values: BTreeMap<String, Value>, points_to_next: bool) -> Self {
        Cursor {
            values,
            points_to_next,
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn encode(&self) -> Result<String> {
        let mut values = BTreeMap::new();
        for (k, v) in &self.values {
            values.insert(k.clone(), CursorValue::try_from(v)?);
        }
        let payload = CursorPayload {
            values,
            points_to_next: self.points_to_next,
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|e| LihtneError::runtime(format!("cursor encode failed: {e}")))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| LihtneError::invalid_argument(format!("invalid cursor: {e}")))?;
        let payload: CursorPayload = serde_json::from_slice(&bytes)
            .map_err(|e| LihtneError::invalid_argument(format!("invalid cursor: {e}")))?;
        let values = payload
            .values
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect();
        Ok(Cursor {
            values,
            points_to_next: payload.points_to_next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let mut values = BTreeMap::new();
        values.insert("id".to_string(), Value::Int(42));
        values.insert("name".to_string(), Value::Str("a".to_string()));
        let cursor = Cursor::new(values, true);
        let encoded = cursor.encode().unwrap();
        let decoded = Cursor::decode(&encoded).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn rejects_raw_values() {
        let mut values = BTreeMap::new();
        values.insert("id".to_string(), Value::raw("NOW()"));
        let cursor = Cursor::new(values, true);
        assert!(cursor.encode().is_err());
    }
}
