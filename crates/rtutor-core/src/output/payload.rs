use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::grading::{coerce_to_string, is_truthy};

/// The `data` carried by one interpreter output record.
///
/// Classified once, when the record is received, so rendering is a plain
/// match instead of probing an untyped value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Payload {
    /// A line of captured text.
    Text(String),
    /// No data at all.
    #[default]
    Absent,
    /// A warning, message or error condition with a non-empty `message`.
    Condition {
        message: String,
        fields: Map<String, Value>,
    },
    /// A record or array with nothing in it.
    EmptyRecord,
    /// Any other record or array; rendered as JSON.
    Structured(Value),
    /// A number or boolean, kept as received.
    Scalar(Value),
    /// Data the host could not serialize (e.g. a cyclic object graph).
    Opaque,
}

impl Payload {
    pub fn text(s: impl Into<String>) -> Self {
        Payload::Text(s.into())
    }

    pub fn condition(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = Map::new();
        fields.insert("message".to_string(), Value::String(message.clone()));
        Payload::Condition { message, fields }
    }

    /// Classify a raw JSON payload.
    pub fn classify(value: Value) -> Self {
        match value {
            Value::String(s) => Payload::Text(s),
            Value::Null => Payload::Absent,
            Value::Bool(_) | Value::Number(_) => Payload::Scalar(value),
            Value::Object(fields) => match fields.get("message").filter(|m| is_truthy(m)) {
                Some(message) => Payload::Condition {
                    message: coerce_to_string(message),
                    fields,
                },
                None if fields.is_empty() => Payload::EmptyRecord,
                None => Payload::Structured(Value::Object(fields)),
            },
            Value::Array(items) if items.is_empty() => Payload::EmptyRecord,
            Value::Array(items) => Payload::Structured(Value::Array(items)),
        }
    }

    /// The unescaped text this payload displays as. Never fails.
    pub fn display_text(&self) -> String {
        match self {
            Payload::Text(s) => s.clone(),
            Payload::Scalar(value) => coerce_to_string(value),
            Payload::Condition { message, .. } => message.clone(),
            Payload::Absent | Payload::EmptyRecord | Payload::Opaque => String::new(),
            Payload::Structured(value) => serde_json::to_string(value)
                .ok()
                .filter(|json| json != "{}")
                .unwrap_or_default(),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::classify(value)
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(s) => Value::String(s),
            Payload::Absent | Payload::Opaque => Value::Null,
            Payload::Condition { fields, .. } => Value::Object(fields),
            Payload::EmptyRecord => Value::Object(Map::new()),
            Payload::Structured(value) => value,
            Payload::Scalar(value) => value,
        }
    }
}
