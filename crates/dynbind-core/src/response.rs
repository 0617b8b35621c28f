//! Operation responses
//!
//! Every lifecycle operation answers with a flat JSON object whose `error`
//! member is `null` on success:
//!
//! ```json
//! {"error": null, "token": "3f2a…e901"}
//! {"error": null, "aaaa": "2001:db8::1"}
//! {"error": "Token not found"}
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind};

/// Structured result of one lifecycle operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Human-readable failure message, `None` on success
    pub error: Option<String>,

    /// Operation-specific fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,

    #[serde(skip)]
    kind: Option<ErrorKind>,
}

impl Response {
    /// Successful response with no extra fields
    pub fn ok() -> Self {
        Self {
            error: None,
            fields: Map::new(),
            kind: None,
        }
    }

    /// Add a string field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), Value::String(value.into()));
        self
    }

    /// Failed response carrying `err`'s message
    pub fn failure(err: &Error) -> Self {
        Self {
            error: Some(err.to_string()),
            fields: Map::new(),
            kind: Some(err.kind()),
        }
    }

    /// Whether the operation succeeded
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Classification of the failure, if any
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.kind
    }

    /// Look up a string field
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Render as a JSON value
    pub fn to_json(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert(
            "error".to_string(),
            self.error.clone().map_or(Value::Null, Value::String),
        );
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let response = Response::ok().with_field("aaaa", "2001:db8::1");
        assert!(response.is_success());
        assert_eq!(response.field("aaaa"), Some("2001:db8::1"));
        assert_eq!(
            response.to_json(),
            json!({"error": null, "aaaa": "2001:db8::1"})
        );
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"error": null, "aaaa": "2001:db8::1"})
        );
    }

    #[test]
    fn test_failure_shape() {
        let response = Response::failure(&Error::UnknownToken);
        assert!(!response.is_success());
        assert_eq!(response.error_kind(), Some(ErrorKind::NotFound));
        assert_eq!(response.to_json(), json!({"error": "Token not found"}));
    }
}
