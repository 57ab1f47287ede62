use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fields::Timestamp;
use super::validate::{check_fields, expect_object, FieldError, FieldKind, FieldRule, ValidationError};

const CONTENTS_RULES: &[FieldRule] = &[
    FieldRule::required("name", FieldKind::Text),
    FieldRule::required("path", FieldKind::Text),
    FieldRule::required("type", FieldKind::Text),
    FieldRule::required("fileType", FieldKind::Text),
    FieldRule::required("created", FieldKind::Timestamp),
    FieldRule::required("last_modified", FieldKind::Timestamp),
    FieldRule::optional("writable", FieldKind::Flag),
    FieldRule::optional("mimetype", FieldKind::Text),
    FieldRule::optional("content", FieldKind::Content),
    FieldRule::optional("format", FieldKind::Text),
    FieldRule::optional("chunk", FieldKind::Integer),
];

pub const CONTENT_FORMATS: &[&str] = &["json", "text", "base64"];

/// A document as the local contents manager describes it.
///
/// `type` and `fileType` always carry the same value: whichever one the caller
/// supplied, with `fileType` winning when both are present and differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct ContentsModel {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    kind: String,
    pub created: Timestamp,
    pub last_modified: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<i64>,
    #[serde(rename = "fileType")]
    file_type: String,
}

/// Plain serde shape used once the raw object has been normalized and checked.
#[derive(Deserialize)]
struct ContentsWire {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    created: Timestamp,
    last_modified: Timestamp,
    #[serde(default)]
    writable: Option<bool>,
    #[serde(default)]
    mimetype: Option<String>,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    chunk: Option<i64>,
    #[serde(rename = "fileType")]
    file_type: String,
}

impl ContentsModel {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        kind: impl Into<String>,
        created: impl Into<Timestamp>,
        last_modified: impl Into<Timestamp>,
    ) -> Self {
        let kind = kind.into();
        Self {
            name: name.into(),
            path: path.into(),
            file_type: kind.clone(),
            kind,
            created: created.into(),
            last_modified: last_modified.into(),
            writable: None,
            mimetype: None,
            content: None,
            format: None,
            chunk: None,
        }
    }

    pub fn with_content(mut self, format: impl Into<String>, content: Value) -> Self {
        self.format = Some(format.into());
        self.content = Some(content);
        self
    }

    pub fn kind(&self) -> &str { &self.kind }

    pub fn file_type(&self) -> &str { &self.file_type }

    /// Sets `type` and `fileType` together.
    pub fn set_kind(&mut self, kind: impl Into<String>) {
        let kind = kind.into();
        self.file_type = kind.clone();
        self.kind = kind;
    }

    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let mut map = expect_object(value)?;
        ValidationError::check(inspect(&mut map, ""))?;
        let wire: ContentsWire = serde_json::from_value(Value::Object(map))
            .map_err(|e| ValidationError::field("$", e.to_string()))?;
        Ok(Self {
            name: wire.name,
            path: wire.path,
            kind: wire.kind,
            created: wire.created,
            last_modified: wire.last_modified,
            writable: wire.writable,
            mimetype: wire.mimetype,
            content: wire.content,
            format: wire.format,
            chunk: wire.chunk,
            file_type: wire.file_type,
        })
    }
}

impl TryFrom<Value> for ContentsModel {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> { Self::from_value(value) }
}

/// Make `type` and `fileType` agree. Runs before any field check.
pub(crate) fn normalize_file_type(map: &mut Map<String, Value>) {
    let file_type = match map.get("fileType") {
        Some(v) if !v.is_null() => Some(v.clone()),
        _ => map.get("type").filter(|v| !v.is_null()).cloned(),
    };
    if let Some(v) = file_type {
        map.insert("type".to_string(), v.clone());
        map.insert("fileType".to_string(), v);
    }
}

/// Normalize then check a raw contents object, reporting fields under `prefix`.
pub(crate) fn inspect(map: &mut Map<String, Value>, prefix: &str) -> Vec<FieldError> {
    normalize_file_type(map);
    let mut errors = check_fields(map, CONTENTS_RULES, prefix);
    if let Some(Value::String(format)) = map.get("format") {
        if !CONTENT_FORMATS.contains(&format.as_str()) {
            errors.push(FieldError::new(
                format!("{prefix}format"),
                format!("unknown format '{format}', expected one of json, text, base64"),
            ));
        }
    }
    errors
}

#[cfg(test)]
#[path = "contents_tests.rs"]
mod contents_tests;
