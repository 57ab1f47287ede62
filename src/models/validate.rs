//! Field-level validation for JSON bodies crossing the HTTP boundary.
//!
//! Each model declares a table of [`FieldRule`]s. [`check_fields`] walks the table
//! against the raw JSON object and reports every offending field by name, so a
//! caller sees all problems at once instead of the first serde failure.

use std::fmt::{Display, Formatter};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// Rejected body: one entry per offending field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(errors: Vec<FieldError>) -> Self { Self { errors } }

    pub fn field<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self { errors: vec![FieldError::new(field, message)] }
    }

    /// Ok when nothing was collected, so callers can `?` a finished check.
    pub fn check(errors: Vec<FieldError>) -> Result<(), Self> {
        if errors.is_empty() { Ok(()) } else { Err(Self { errors }) }
    }

    pub fn mentions(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid fields: ")?;
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 { write!(f, "; ")?; }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Text,
    Flag,
    Integer,
    /// ISO-8601 string; structured date-times only exist on the Rust side.
    Timestamp,
    /// Document payload: notebook JSON object or a text/base64 string.
    Content,
    Url,
    TextList,
    Object,
    ObjectList,
}

impl FieldKind {
    fn accepts(self, v: &Value) -> bool {
        match self {
            FieldKind::Text | FieldKind::Timestamp => v.is_string(),
            FieldKind::Flag => v.is_boolean(),
            FieldKind::Integer => v.is_i64() || v.is_u64(),
            FieldKind::Content => v.is_object() || v.is_string(),
            FieldKind::Url => v.as_str().map(|s| Url::parse(s).is_ok()).unwrap_or(false),
            FieldKind::TextList => v.as_array().map(|a| a.iter().all(Value::is_string)).unwrap_or(false),
            FieldKind::Object => v.is_object(),
            FieldKind::ObjectList => v.as_array().map(|a| a.iter().all(Value::is_object)).unwrap_or(false),
        }
    }

    fn expectation(self) -> &'static str {
        match self {
            FieldKind::Text => "expected a string",
            FieldKind::Timestamp => "expected an ISO-8601 date-time string",
            FieldKind::Flag => "expected a boolean",
            FieldKind::Integer => "expected an integer",
            FieldKind::Content => "expected a JSON object or a string",
            FieldKind::Url => "expected an absolute URL",
            FieldKind::TextList => "expected a list of strings",
            FieldKind::Object => "expected a JSON object",
            FieldKind::ObjectList => "expected a list of JSON objects",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldRule {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: true }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: false }
    }
}

/// Check `map` against `rules`. Optional fields treat `null` as absent.
/// Field names in the report are prefixed with `prefix` for nested objects.
pub(crate) fn check_fields(map: &Map<String, Value>, rules: &[FieldRule], prefix: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for rule in rules {
        match map.get(rule.name) {
            None | Some(Value::Null) => {
                if rule.required {
                    errors.push(FieldError::new(format!("{prefix}{}", rule.name), "field required"));
                }
            }
            Some(v) => {
                if !rule.kind.accepts(v) {
                    errors.push(FieldError::new(format!("{prefix}{}", rule.name), rule.kind.expectation()));
                }
            }
        }
    }
    errors
}

/// Unwrap a body that must be a JSON object.
pub(crate) fn expect_object(value: Value) -> Result<Map<String, Value>, ValidationError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ValidationError::field("$", format!("expected a JSON object, got {}", json_kind(&other)))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
