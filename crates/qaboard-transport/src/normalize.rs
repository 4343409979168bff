//! Response normalizer
//!
//! The backend has answered in more than one convention over time:
//! - `{status: "success" | "error", data?, message?}`
//! - `{success: bool, ...fields}`
//! - an unannotated object or array
//!
//! [`normalize`] classifies a raw payload into one [`RawShape`] by checking an
//! ordered rule list, then maps the shape to a [`ResponseEnvelope`]. The
//! mapping is total: every JSON value lands in exactly one shape.

use serde_json::{Map, Value};

/// Status marker for success
pub const STATUS_SUCCESS: &str = "success";

/// Status marker for failure
pub const STATUS_ERROR: &str = "error";

/// Failure text for an absent payload
pub const NO_RESPONSE: &str = "no response received";

/// Failure text when the far side gave no reason
pub const GENERIC_FAILURE: &str = "request failed";

/// Canonical result of one remote call
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    /// Call succeeded with this data
    Success(Value),
    /// Far side reported an error with this message
    Failure(String),
}

impl ResponseEnvelope {
    /// Check if success
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Failure message, if any
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Failure(message) => Some(message),
            Self::Success(_) => None,
        }
    }

    /// Read a field from the success payload, falling back to its nested `data` object
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        let Self::Success(payload) = self else {
            return None;
        };
        payload
            .get(name)
            .filter(|value| !value.is_null())
            .or_else(|| payload.get("data").and_then(|data| data.get(name)))
            .filter(|value| !value.is_null())
    }

    /// Convert into a `Result`
    pub fn into_result(self) -> Result<Value, String> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Failure(message) => Err(message),
        }
    }
}

/// Which convention produced a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawShape {
    /// Nothing usable was delivered
    Absent,
    /// `{status: "success"}`
    StatusSuccess,
    /// `{status: "error"}`
    StatusError,
    /// `{success: false}`
    ExplicitFailure,
    /// Anything else, including `{success: true}`
    Legacy,
}

impl RawShape {
    /// Classify a raw payload; rules are checked in order
    #[must_use]
    pub fn classify(raw: &Value) -> Self {
        if is_absent(raw) {
            return Self::Absent;
        }
        let Some(object) = raw.as_object() else {
            return Self::Legacy;
        };

        match object.get("status").and_then(Value::as_str) {
            Some(STATUS_SUCCESS) => return Self::StatusSuccess,
            Some(STATUS_ERROR) => return Self::StatusError,
            _ => {}
        }

        if object.get("success") == Some(&Value::Bool(false)) {
            return Self::ExplicitFailure;
        }

        Self::Legacy
    }
}

/// Normalize a raw payload into an envelope
#[must_use]
pub fn normalize(raw: Value) -> ResponseEnvelope {
    match RawShape::classify(&raw) {
        RawShape::Absent => ResponseEnvelope::Failure(NO_RESPONSE.to_string()),
        RawShape::StatusSuccess => match raw {
            Value::Object(mut object) => match object.remove("data") {
                Some(data) => ResponseEnvelope::Success(data),
                None => ResponseEnvelope::Success(Value::Object(object)),
            },
            other => ResponseEnvelope::Success(other),
        },
        RawShape::StatusError => {
            ResponseEnvelope::Failure(reason(&raw, &["message", "error"]))
        }
        RawShape::ExplicitFailure => ResponseEnvelope::Failure(reason(&raw, &["error"])),
        RawShape::Legacy => ResponseEnvelope::Success(raw),
    }
}

/// Null, `false`, `0` and `""` count as "nothing delivered"
fn is_absent(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn reason(raw: &Value, fields: &[&str]) -> String {
    raw.as_object()
        .and_then(|object| first_text(object, fields))
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

fn first_text(object: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match object.get(*field)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        value if !is_absent(value) && !value.is_string() => Some(value.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn absent_payloads_fail() {
        for raw in [Value::Null, json!(false), json!(0), json!("")] {
            assert_eq!(normalize(raw), ResponseEnvelope::Failure(NO_RESPONSE.to_string()));
        }
    }

    #[test]
    fn status_success_unwraps_data() {
        let envelope = normalize(json!({"status": "success", "data": [{"id": "Q1"}]}));
        assert_eq!(envelope, ResponseEnvelope::Success(json!([{"id": "Q1"}])));
    }

    #[test]
    fn status_success_without_data_keeps_payload() {
        let envelope = normalize(json!({"status": "success", "questionId": "Q9"}));
        assert_eq!(
            envelope,
            ResponseEnvelope::Success(json!({"status": "success", "questionId": "Q9"}))
        );
    }

    #[test]
    fn status_success_with_null_data_is_null() {
        let envelope = normalize(json!({"status": "success", "data": null}));
        assert_eq!(envelope, ResponseEnvelope::Success(Value::Null));
    }

    #[test]
    fn status_error_prefers_message_then_error() {
        assert_eq!(
            normalize(json!({"status": "error", "message": "denied", "error": "E1"})),
            ResponseEnvelope::Failure("denied".to_string())
        );
        assert_eq!(
            normalize(json!({"status": "error", "message": "", "error": "E1"})),
            ResponseEnvelope::Failure("E1".to_string())
        );
        assert_eq!(
            normalize(json!({"status": "error"})),
            ResponseEnvelope::Failure(GENERIC_FAILURE.to_string())
        );
    }

    #[test]
    fn status_takes_precedence_over_success_flag() {
        let envelope = normalize(json!({"status": "error", "success": true, "message": "no"}));
        assert_eq!(envelope, ResponseEnvelope::Failure("no".to_string()));
    }

    #[test]
    fn explicit_false_success_flag_fails() {
        assert_eq!(
            normalize(json!({"success": false, "error": "bad password"})),
            ResponseEnvelope::Failure("bad password".to_string())
        );
        assert_eq!(
            normalize(json!({"success": false, "message": "ignored"})),
            ResponseEnvelope::Failure(GENERIC_FAILURE.to_string())
        );
    }

    #[test]
    fn legacy_shapes_succeed_whole() {
        let raw = json!({"success": true, "sessionToken": "t"});
        assert_eq!(normalize(raw.clone()), ResponseEnvelope::Success(raw));

        let raw = json!([{"topicName": "General"}]);
        assert_eq!(normalize(raw.clone()), ResponseEnvelope::Success(raw));

        let raw = json!({"status": "pending"});
        assert_eq!(normalize(raw.clone()), ResponseEnvelope::Success(raw));
    }

    #[test]
    fn field_looks_through_data() {
        let flat = normalize(json!({"success": true, "questionId": "Q1"}));
        let nested = normalize(json!({"success": true, "data": {"questionId": "Q1"}}));

        assert_eq!(flat.field("questionId"), Some(&json!("Q1")));
        assert_eq!(nested.field("questionId"), Some(&json!("Q1")));
        assert_eq!(flat.field("missing"), None);
        assert_eq!(ResponseEnvelope::Failure("x".into()).field("questionId"), None);
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|map| Value::Object(map.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn classification_is_total(raw in arb_json()) {
            let envelope = normalize(raw.clone());
            match RawShape::classify(&raw) {
                RawShape::Absent | RawShape::StatusError | RawShape::ExplicitFailure => {
                    prop_assert!(!envelope.is_success());
                }
                RawShape::StatusSuccess | RawShape::Legacy => prop_assert!(envelope.is_success()),
            }
        }

        #[test]
        fn shapes_agree_on_attached_data(data in arb_json()) {
            let via_status = normalize(json!({"status": "success", "data": data.clone()}));
            prop_assert_eq!(via_status, ResponseEnvelope::Success(data.clone()));

            let via_flag = normalize(json!({"success": true, "data": data.clone()}));
            prop_assert_eq!(via_flag.field("data").cloned().unwrap_or(Value::Null), data.clone());

            let annotated = data
                .as_object()
                .is_some_and(|object| object.contains_key("status") || object.contains_key("success"));
            if !annotated && RawShape::classify(&data) != RawShape::Absent {
                prop_assert_eq!(normalize(data.clone()), ResponseEnvelope::Success(data));
            }
        }
    }
}
