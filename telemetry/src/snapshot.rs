//! Raw snapshots as received from the realtime database
//!
//! Every field is optional and may arrive as text, a number or a boolean.
//! Nothing is coerced here; the resolvers decide how to read each field.

use crate::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// A loosely-typed leaf value. Numbers keep their JSON form so integers
/// survive capture and export unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(Number),
    Text(String),
}

impl Scalar {
    /// Convert a JSON value; null and nested structures are not scalars
    pub fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => Some(Scalar::Number(n.clone())),
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Empty text and the literal "None" count as not set
    pub fn is_unset(&self) -> bool {
        matches!(self, Scalar::Text(s) if s.is_empty() || s == "None")
    }

    pub fn text(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }

    /// A float number; non-finite values have no JSON form
    pub fn number(n: f64) -> Option<Self> {
        Number::from_f64(n).map(Scalar::Number)
    }

    /// Numeric value of a number; text and booleans give `None`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => n.as_f64(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// Outcome of reading one field
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Value(T),
    Absent,
    Invalid(String),
}

impl<T> Field<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Field::Value(_))
    }

    /// Try `next` unless this field already produced a value
    pub fn or_else(self, next: impl FnOnce() -> Field<T>) -> Field<T> {
        match self {
            Field::Value(v) => Field::Value(v),
            _ => next(),
        }
    }
}

/// Snapshot of the device document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSnapshot {
    pub animal: Option<Scalar>,
    pub human: Option<Scalar>,
    pub role: Option<Scalar>,
    pub human_count: Option<Scalar>,
    pub ble_present: Option<Scalar>,
    pub ble_rssi: Option<Scalar>,
    pub ble_last_seen: Option<Scalar>,
    pub timestamp: Option<Scalar>,
    pub time: Option<Scalar>,
    pub ts: Option<Scalar>,
    pub lat: Option<Scalar>,
    pub latitude: Option<Scalar>,
    pub lng: Option<Scalar>,
    pub longitude: Option<Scalar>,
    pub confidence: Option<Scalar>,
}

impl RawSnapshot {
    /// Read a snapshot out of a JSON document. Unknown keys are ignored,
    /// non-scalar values for known keys are treated as absent.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(TelemetryError::InvalidSnapshot(type_name(value).to_string()));
        };

        let get = |key: &str| {
            let field = map.get(key)?;
            let scalar = Scalar::from_json(field);
            if scalar.is_none() && !field.is_null() {
                tracing::debug!(key, "Ignoring non-scalar field");
            }
            scalar
        };

        Ok(Self {
            animal: get("animal"),
            human: get("human"),
            role: get("role"),
            human_count: get("human_count"),
            ble_present: get("ble_present"),
            ble_rssi: get("ble_rssi"),
            ble_last_seen: get("ble_last_seen"),
            timestamp: get("timestamp"),
            time: get("time"),
            ts: get("ts"),
            lat: get("lat"),
            latitude: get("latitude"),
            lng: get("lng"),
            longitude: get("longitude"),
            confidence: get("confidence"),
        })
    }
}

/// The field's value if it is present and set
pub fn set_value(field: &Option<Scalar>) -> Option<&Scalar> {
    field.as_ref().filter(|s| !s.is_unset())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
