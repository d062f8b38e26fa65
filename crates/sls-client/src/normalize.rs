// crates/sls-client/src/normalize.rs
// ============================================================================
// Module: Response Normalizer
// Description: Classifies transport results into a uniform result shape.
// Purpose: Give every caller one success/error envelope regardless of body.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`normalize`] maps a [`ResponseEnvelope`] and a [`ResponseShape`] hint
//! onto a [`NormalizedResult`]:
//! - transport errors and non-2xx statuses become `Error`;
//! - a body that does not parse, or parses to the wrong JSON type, becomes
//!   `Raw`;
//! - otherwise the parsed body is returned in the hinted shape.
//!
//! The normalizer never fails. Malformed upstream JSON must not crash the
//! caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

use crate::transport::ResponseEnvelope;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Expected body shape for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// JSON object merged into the result map.
    Object,
    /// JSON array returned as a sequence.
    List,
    /// Any JSON wrapped under `data`.
    Passthrough,
}

/// Uniform result returned to callers.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedResult {
    /// Parsed JSON object.
    Object(Map<String, Value>),
    /// Parsed JSON array.
    List(Vec<Value>),
    /// Opaque parsed payload.
    Data(Value),
    /// Successful response whose body could not be parsed as expected.
    Raw(String),
    /// Transport failure or upstream error status.
    Error(String),
}

impl NormalizedResult {
    /// Returns true for the error variant.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns the error message for the error variant.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Renders the result as JSON.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Object(map) => Value::Object(map),
            Self::List(items) => Value::Array(items),
            Self::Data(value) => single_field("data", value),
            Self::Raw(body) => single_field("raw", Value::String(body)),
            Self::Error(message) => single_field("error", Value::String(message)),
        }
    }
}

/// Normalized result carrying request-identifying fields for traceability.
#[derive(Debug, Clone, PartialEq)]
pub struct EchoedResult {
    /// Underlying result.
    pub result: NormalizedResult,
    /// Fields merged into the rendered object.
    pub echo: Map<String, Value>,
}

impl EchoedResult {
    /// Wraps a result with echo fields.
    #[must_use]
    pub const fn new(result: NormalizedResult, echo: Map<String, Value>) -> Self {
        Self {
            result,
            echo,
        }
    }

    /// Returns true when the underlying result is an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.result.is_error()
    }

    /// Renders the result with echo fields merged in.
    ///
    /// Echo fields overwrite body keys of the same name. List results have no
    /// object to merge into and are rendered unchanged.
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut value = self.result.into_value();
        if let Value::Object(map) = &mut value {
            map.extend(self.echo);
        }
        value
    }
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Classifies a transport result.
#[must_use]
pub fn normalize(envelope: &ResponseEnvelope, shape: ResponseShape) -> NormalizedResult {
    if let Some(error) = &envelope.error {
        return NormalizedResult::Error(error.clone());
    }
    if !(200..300).contains(&envelope.status_code) {
        return NormalizedResult::Error(envelope.body.clone());
    }
    let Ok(parsed) = serde_json::from_str::<Value>(&envelope.body) else {
        return NormalizedResult::Raw(envelope.body.clone());
    };
    match (shape, parsed) {
        (ResponseShape::Object, Value::Object(map)) => NormalizedResult::Object(map),
        (ResponseShape::List, Value::Array(items)) => NormalizedResult::List(items),
        (ResponseShape::List, Value::Null) => NormalizedResult::List(Vec::new()),
        (ResponseShape::Passthrough, value) => NormalizedResult::Data(value),
        (ResponseShape::Object | ResponseShape::List, _) => {
            NormalizedResult::Raw(envelope.body.clone())
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a one-key JSON object.
fn single_field(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only normalizer assertions."
    )]

    use serde_json::Map;
    use serde_json::json;

    use super::EchoedResult;
    use super::NormalizedResult;
    use super::ResponseShape;
    use super::normalize;
    use crate::transport::ResponseEnvelope;

    fn envelope(status: u16, body: &str) -> ResponseEnvelope {
        ResponseEnvelope::received(status, body, Default::default())
    }

    #[test]
    fn object_body_is_merged() {
        let result = normalize(&envelope(200, r#"{"logstores":["a","b"]}"#), ResponseShape::Object);
        assert_eq!(result.into_value(), json!({"logstores": ["a", "b"]}));
    }

    #[test]
    fn error_status_surfaces_body() {
        let result = normalize(&envelope(404, "not found"), ResponseShape::Object);
        assert_eq!(result.into_value(), json!({"error": "not found"}));
    }

    #[test]
    fn unparsable_body_degrades_to_raw() {
        let result = normalize(&envelope(200, "not-json"), ResponseShape::Passthrough);
        assert_eq!(result.into_value(), json!({"raw": "not-json"}));
    }

    #[test]
    fn transport_error_wins_over_everything() {
        let result =
            normalize(&ResponseEnvelope::transport_failure("timed out"), ResponseShape::List);
        assert_eq!(result, NormalizedResult::Error("timed out".to_string()));
    }

    #[test]
    fn list_shape_handles_null_and_arrays() {
        assert_eq!(
            normalize(&envelope(200, "null"), ResponseShape::List),
            NormalizedResult::List(Vec::new())
        );
        assert_eq!(
            normalize(&envelope(200, r#"[{"shardID":0}]"#), ResponseShape::List).into_value(),
            json!([{"shardID": 0}])
        );
    }

    #[test]
    fn wrong_json_type_is_raw() {
        assert_eq!(
            normalize(&envelope(200, "[1]"), ResponseShape::Object),
            NormalizedResult::Raw("[1]".to_string())
        );
        assert_eq!(
            normalize(&envelope(200, "{}"), ResponseShape::List),
            NormalizedResult::Raw("{}".to_string())
        );
    }

    #[test]
    fn passthrough_wraps_under_data() {
        let result = normalize(&envelope(201, r#"{"count":3}"#), ResponseShape::Passthrough);
        assert_eq!(result.into_value(), json!({"data": {"count": 3}}));
    }

    #[test]
    fn echo_fields_merge_into_every_object_form() {
        let mut echo = Map::new();
        echo.insert("pack_id".to_string(), json!("P1"));
        let error = EchoedResult::new(NormalizedResult::Error("bad".to_string()), echo.clone());
        assert_eq!(error.into_value(), json!({"error": "bad", "pack_id": "P1"}));
        let raw = EchoedResult::new(NormalizedResult::Raw("x".to_string()), echo);
        assert_eq!(raw.into_value(), json!({"raw": "x", "pack_id": "P1"}));
    }
}
