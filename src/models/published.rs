use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::contents::{self, ContentsModel};
use super::fields::{Patch, Timestamp, VersionTag};
use super::validate::{check_fields, expect_object, FieldError, FieldKind, FieldRule, ValidationError};

const USER_RULES: &[FieldRule] = &[
    FieldRule::required("id", FieldKind::Text),
    FieldRule::required("name", FieldKind::Text),
    FieldRule::required("email", FieldKind::Text),
    FieldRule::optional("permissions", FieldKind::TextList),
];

const PATCH_RULES: &[FieldRule] = &[
    FieldRule::optional("id", FieldKind::Text),
    FieldRule::optional("author", FieldKind::Text),
    FieldRule::optional("title", FieldKind::Text),
    FieldRule::optional("collaborators", FieldKind::ObjectList),
    FieldRule::optional("contents", FieldKind::Object),
    FieldRule::optional("notebook_server", FieldKind::Text),
];

const IDENTIFIER_RULES: &[FieldRule] = &[
    FieldRule::optional("id", FieldKind::Text),
    FieldRule::optional("path", FieldKind::Text),
    FieldRule::optional("shareable_link", FieldKind::Url),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Search results may omit display fields; they default to empty.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// A user attached to a published file, with the permissions granted to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    #[serde(flatten)]
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

/// The publishing service's view of a shared document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedFileMetadata {
    pub id: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shareable_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaborators: Option<Vec<Collaborator>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<ContentsModel>,
}

/// Body of `POST /sharing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSharedFileModel {
    pub id: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaborators: Option<Vec<Collaborator>>,
    pub contents: ContentsModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook_server: Option<String>,
}

/// Body of `PATCH /sharing/{id}`. Omitted fields are left alone by the
/// service; `null` clears them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchSharedFileModel {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub title: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub collaborators: Patch<Vec<Collaborator>>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub contents: Patch<ContentsModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook_server: Option<String>,
}

impl PatchSharedFileModel {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let mut map = expect_object(value)?;
        let mut errors = check_fields(&map, PATCH_RULES, "");
        errors.extend(check_collaborators(&map));
        if let Some(Value::Object(inner)) = map.get_mut("contents") {
            errors.extend(contents::inspect(inner, "contents."));
        }
        ValidationError::check(errors)?;
        serde_json::from_value(Value::Object(map)).map_err(|e| ValidationError::field("$", e.to_string()))
    }
}

fn check_collaborators(map: &Map<String, Value>) -> Vec<FieldError> {
    let Some(Value::Array(items)) = map.get("collaborators") else { return Vec::new(); };
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| item.as_object().map(|obj| check_fields(obj, USER_RULES, &format!("collaborators[{i}]."))))
        .flatten()
        .collect()
}

/// Points at a published file by id, shareable link or local path.
///
/// When several are set, `id` wins over `shareable_link`, which wins over
/// `path`. Paths are resolved through the local content index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedFileIdentifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shareable_link: Option<String>,
}

impl PublishedFileIdentifier {
    pub fn from_id(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()), ..Default::default() }
    }

    pub fn from_path(path: impl Into<String>) -> Self {
        Self { path: Some(path.into()), ..Default::default() }
    }

    pub fn from_link(link: impl Into<String>) -> Self {
        Self { shareable_link: Some(link.into()), ..Default::default() }
    }

    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let map = expect_object(value)?;
        ValidationError::check(check_fields(&map, IDENTIFIER_RULES, ""))?;
        serde_json::from_value(Value::Object(map)).map_err(|e| ValidationError::field("$", e.to_string()))
    }
}

/// The file id encoded in a shareable link: its last non-empty path segment.
pub fn id_from_link(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = urlencoding::decode(segment).ok()?;
    Some(decoded.into_owned())
}
