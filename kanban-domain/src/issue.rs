use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Tracker issue as returned by the search and issue endpoints.
///
/// Fields stay an untyped map because rules and analytics address them by
/// configurable identifiers (custom fields included).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub key: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Issue {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            id: None,
            key: key.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn with_status(self, name: &str) -> Self {
        self.with_field("status", json!({ "name": name }))
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn status_name(&self) -> Option<&str> {
        nested_str(self.field("status"), "name")
    }

    pub fn assignee_name(&self) -> Option<&str> {
        nested_str(self.field("assignee"), "displayName")
    }
}

/// Truthiness as the dashboard's JSON consumers see it: `null`, `false`,
/// `0`, `NaN` and `""` count as missing.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number
            .as_f64()
            .map(|value| value != 0.0 && !value.is_nan())
            .unwrap_or(false),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub(crate) fn nested_str<'a>(value: Option<&'a Value>, key: &str) -> Option<&'a str> {
    value
        .and_then(|value| value.get(key))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}
