//!
//! Local content collaborators
//! ---------------------------
//! The content index maps a document path to a stable opaque id (the same id
//! the publishing service files the document under). The content store writes
//! a fetched document back into local storage.
//!
//! Both are owned by the host in production; `MemoryIndex` and
//! `FsContentStore` are the implementations the standalone binary and the
//! tests run with.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::models::ContentsModel;

pub trait ContentIndex: Send + Sync {
    /// Look up the id of an indexed path without creating one.
    fn get_id(&self, path: &str) -> Option<String>;
    /// Return the id for `path`, indexing it first if needed.
    fn index(&self, path: &str) -> io::Result<String>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn save(&self, contents: &ContentsModel, path: &str) -> io::Result<()>;
}

/// In-process index handing out UUIDs, whose hyphenated form matches the
/// five-group file-id pattern of the HTTP routes.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    ids: RwLock<HashMap<String, String>>,
}

impl MemoryIndex {
    pub fn new() -> Self { Self::default() }

    /// Pre-seed a mapping, e.g. for a document published from another server.
    pub fn insert(&self, path: impl Into<String>, id: impl Into<String>) {
        self.ids.write().insert(normalize_path(&path.into()), id.into());
    }

    pub fn len(&self) -> usize { self.ids.read().len() }

    pub fn is_empty(&self) -> bool { self.ids.read().is_empty() }
}

impl ContentIndex for MemoryIndex {
    fn get_id(&self, path: &str) -> Option<String> {
        self.ids.read().get(&normalize_path(path)).cloned()
    }

    fn index(&self, path: &str) -> io::Result<String> {
        let key = normalize_path(path);
        if key.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "cannot index an empty path"));
        }
        let mut ids = self.ids.write();
        let id = ids.entry(key).or_insert_with(|| uuid::Uuid::new_v4().to_string());
        Ok(id.clone())
    }
}

fn normalize_path(path: &str) -> String { path.trim().trim_matches('/').to_string() }

/// Writes documents under a root directory, the way a contents manager lays
/// them out: notebooks as JSON, text as-is, base64 payloads decoded.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    /// Resolve `path` under the root, refusing anything that could escape it.
    pub fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let rel = Path::new(path.trim_start_matches('/'));
        let mut out = self.root.clone();
        let mut depth = 0usize;
        for comp in rel.components() {
            match comp {
                Component::Normal(part) => {
                    out.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                _ => return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("path escapes contents root: {path}"))),
            }
        }
        if depth == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty document path"));
        }
        Ok(out)
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn save(&self, contents: &ContentsModel, path: &str) -> io::Result<()> {
        let target = self.resolve(path)?;
        if contents.kind() == "directory" {
            return tokio::fs::create_dir_all(&target).await;
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = encode_payload(contents)?;
        debug!(target: "publishing", path = %target.display(), bytes = bytes.len(), "writing document");
        tokio::fs::write(&target, bytes).await
    }
}

fn encode_payload(contents: &ContentsModel) -> io::Result<Vec<u8>> {
    let invalid = |msg: String| io::Error::new(io::ErrorKind::InvalidData, msg);
    match (contents.format.as_deref(), contents.content.as_ref()) {
        (_, None) => Ok(Vec::new()),
        (Some("base64"), Some(Value::String(s))) => base64::engine::general_purpose::STANDARD
            .decode(s.replace(['\n', '\r'], ""))
            .map_err(|e| invalid(format!("bad base64 content for {}: {e}", contents.path))),
        (Some("text") | None, Some(Value::String(s))) => Ok(s.as_bytes().to_vec()),
        (Some("json") | None, Some(v @ Value::Object(_))) => {
            let mut out = serde_json::to_vec_pretty(v).map_err(|e| invalid(e.to_string()))?;
            out.push(b'\n');
            Ok(out)
        }
        (format, Some(_)) => Err(invalid(format!(
            "content of {} does not match format {}",
            contents.path,
            format.unwrap_or("<none>")
        ))),
    }
}
