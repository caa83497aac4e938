//! Tool call and result value types.
//!
//! A tool call is what the model asks for; a tool result is what goes back.
//! Results are always data: failures are `{error}` payloads, never panics
//! or propagated errors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single argument value. The tool protocol only uses strings and
/// string arrays; anything else is coerced or dropped when parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Str(String),
    List(Vec<String>),
}

/// String-keyed argument mapping. Omitted arguments are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArguments(BTreeMap<String, ArgValue>);

impl ToolArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), ArgValue::Str(value.into()));
        self
    }

    pub fn with_list(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.0.insert(key.into(), ArgValue::List(values));
        self
    }

    /// String argument, if present.
    pub fn str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(ArgValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// List argument; a lone string is treated as a one-element list.
    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        match self.0.get(key) {
            Some(ArgValue::List(v)) => Some(v.clone()),
            Some(ArgValue::Str(s)) => Some(vec![s.clone()]),
            None => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Build arguments from an arbitrary JSON value.
    ///
    /// Numbers and booleans are stringified, arrays keep their scalar
    /// elements, nulls and nested objects are dropped. A non-object
    /// value yields an empty argument set.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut map = BTreeMap::new();
        let Some(obj) = value.as_object() else {
            return Self(map);
        };
        for (key, v) in obj {
            let converted = match v {
                serde_json::Value::String(s) => Some(ArgValue::Str(s.clone())),
                serde_json::Value::Number(n) => Some(ArgValue::Str(n.to_string())),
                serde_json::Value::Bool(b) => Some(ArgValue::Str(b.to_string())),
                serde_json::Value::Array(items) => Some(ArgValue::List(
                    items.iter().filter_map(scalar_to_string).collect(),
                )),
                serde_json::Value::Null | serde_json::Value::Object(_) => None,
            };
            if let Some(c) = converted {
                map.insert(key.clone(), c);
            }
        }
        Self(map)
    }

    /// Parse a JSON-encoded argument string, substituting an empty set on
    /// failure (some providers send malformed argument strings).
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::new();
        }
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(v) => Self::from_json(&v),
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable tool arguments, using empty set");
                Self::new()
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

fn scalar_to_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A request from the model to run a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call ID, unique within one provider turn
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments
    #[serde(default)]
    pub arguments: ToolArguments,
}

/// The outcome of one tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResult {
    /// `{"error": "..."}` on the wire.
    Error { error: String },
    /// Tool-specific success payload.
    Success(serde_json::Value),
}

impl ToolResult {
    pub fn ok(payload: serde_json::Value) -> Self {
        Self::Success(payload)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// The JSON payload handed back to the model.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Success(v) => v.clone(),
            Self::Error { error } => serde_json::json!({ "error": error }),
        }
    }
}
