//! Shared fixtures: an in-memory publishing service behind the `Transport`
//! seam, a call-counting client wrapper and a router harness.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use notebook_sharing::client::{OutboundRequest, PublishingClient, PublishingServiceClient, RemoteResponse, Transport};
use notebook_sharing::config::PublishingConfig;
use notebook_sharing::content::{FsContentStore, MemoryIndex};
use notebook_sharing::error::{PublishingResult, TransportError, TransportErrorKind};
use notebook_sharing::identity::{Identity, TokenAuthenticator};
use notebook_sharing::models::{
    ContentsModel, CreateSharedFileModel, PatchSharedFileModel, PublishedFileIdentifier, PublishedFileMetadata, User,
};
use notebook_sharing::server::{self, AppState};

pub const SERVICE_URL: &str = "https://publish.test/api";
pub const USER_TOKEN: &str = "ann-session-token";

pub fn ann() -> User {
    User { id: "u-ann".into(), name: "Ann Lee".into(), email: "ann@example.com".into() }
}

pub fn ann_identity() -> Identity {
    Identity::new(ann()).with_token(USER_TOKEN)
}

pub fn notebook(path: &str) -> ContentsModel {
    let name = path.rsplit('/').next().unwrap_or(path).to_string();
    ContentsModel::new(name, path, "notebook", "2024-05-01T09:00:00+00:00", "2024-05-02T10:30:00+00:00")
        .with_content("json", json!({"cells": [{"cell_type": "markdown", "source": "# hi"}], "nbformat": 4}))
}

fn json_response(status: u16, body: Value) -> RemoteResponse {
    RemoteResponse { status, body: serde_json::to_vec(&body).unwrap() }
}

fn empty_response(status: u16) -> RemoteResponse {
    RemoteResponse { status, body: Vec::new() }
}

/// In-memory stand-in for the remote publishing service.
pub struct StubService {
    files: Mutex<BTreeMap<String, Value>>,
    requests: Mutex<Vec<OutboundRequest>>,
    canned: Mutex<VecDeque<RemoteResponse>>,
    calls: AtomicUsize,
    refreshes: AtomicUsize,
    tls_failures: AtomicUsize,
    timeouts: AtomicUsize,
    users: Vec<User>,
}

impl StubService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            files: Mutex::new(BTreeMap::new()),
            requests: Mutex::new(Vec::new()),
            canned: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            tls_failures: AtomicUsize::new(0),
            timeouts: AtomicUsize::new(0),
            users: vec![
                ann(),
                User { id: "u-bob".into(), name: "Bob Stone".into(), email: "bob@example.com".into() },
                User { id: "u-cy".into(), name: "Cy Bobbins".into(), email: "cy@example.com".into() },
            ],
        })
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    pub fn refreshes(&self) -> usize { self.refreshes.load(Ordering::SeqCst) }

    pub fn fail_tls(&self, times: usize) { self.tls_failures.store(times, Ordering::SeqCst); }

    pub fn fail_timeout(&self, times: usize) { self.timeouts.store(times, Ordering::SeqCst); }

    /// Answer the next request with a fixed response instead of routing it.
    pub fn respond_once(&self, status: u16, body: &str) {
        self.canned.lock().push_back(RemoteResponse { status, body: body.as_bytes().to_vec() });
    }

    pub fn requests(&self) -> Vec<OutboundRequest> { self.requests.lock().clone() }

    pub fn last_request(&self) -> OutboundRequest {
        self.requests.lock().last().cloned().expect("no request was sent")
    }

    pub fn stored(&self, id: &str) -> Option<Value> { self.files.lock().get(id).cloned() }

    pub fn seed(&self, metadata: Value) {
        let id = metadata["id"].as_str().expect("seed needs an id").to_string();
        self.files.lock().insert(id, metadata);
    }

    fn route(&self, req: &OutboundRequest) -> RemoteResponse {
        let path = req.url.path().trim_start_matches("/api").to_string();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let query: HashMap<String, String> = req.url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();

        match (req.method.as_str(), segments.as_slice()) {
            ("GET", ["sharing"]) => {
                let author = query.get("author").cloned().unwrap_or_else(|| "me".to_string());
                let files: Vec<Value> = self
                    .files
                    .lock()
                    .values()
                    .filter(|m| author == "me" || m["author"] == author.as_str())
                    .map(|m| json!({"id": m["id"], "title": m["title"], "author": m["author"]}))
                    .collect();
                json_response(200, json!({ "files": files }))
            }
            ("POST", ["sharing"]) => {
                let Some(body) = req.body.clone() else { return json_response(400, json!({"detail": "no body"})) };
                let create: CreateSharedFileModel = match serde_json::from_value(body) {
                    Ok(c) => c,
                    Err(e) => return json_response(422, json!({"detail": e.to_string()})),
                };
                let mut files = self.files.lock();
                if files.contains_key(&create.id) {
                    return json_response(409, json!({"detail": "exists"}));
                }
                let metadata = json!({
                    "id": create.id,
                    "author": create.author,
                    "title": create.title,
                    "shareable_link": format!("https://publish.test/view/{}", create.id),
                    "created": "2024-05-03T08:00:00+00:00",
                    "last_modified": "2024-05-03T08:00:00+00:00",
                    "version": 1,
                    "permissions": ["read", "write"],
                    "collaborators": [],
                    "contents": create.contents,
                });
                files.insert(create.id.clone(), metadata.clone());
                json_response(201, metadata)
            }
            ("GET", ["sharing", id]) => match self.files.lock().get(*id) {
                Some(m) => {
                    let mut m = m.clone();
                    if query.get("collaborators").map(String::as_str) == Some("False") {
                        m.as_object_mut().unwrap().remove("collaborators");
                    }
                    json_response(200, m)
                }
                None => json_response(404, json!({"detail": "not found"})),
            },
            ("PATCH", ["sharing", id]) => {
                let mut files = self.files.lock();
                let Some(current) = files.get_mut(*id) else { return json_response(404, json!({"detail": "not found"})) };
                let patch = req.body.clone().unwrap_or(Value::Null);
                let _: PatchSharedFileModel = match serde_json::from_value(patch.clone()) {
                    Ok(p) => p,
                    Err(e) => return json_response(422, json!({"detail": e.to_string()})),
                };
                let obj = current.as_object_mut().unwrap();
                for (k, v) in patch.as_object().unwrap() {
                    if k == "id" || k == "notebook_server" { continue; }
                    if v.is_null() { obj.remove(k); } else { obj.insert(k.clone(), v.clone()); }
                }
                let version = obj.get("version").and_then(Value::as_i64).unwrap_or(0);
                obj.insert("version".into(), json!(version + 1));
                json_response(200, current.clone())
            }
            ("DELETE", ["sharing", id]) => match self.files.lock().remove(*id) {
                Some(_) => empty_response(204),
                None => json_response(404, json!({"detail": "not found"})),
            },
            ("GET", ["sharing", id, "preview"]) => match self.files.lock().get(*id) {
                Some(m) => json_response(200, json!({
                    "id": m["id"],
                    "title": m["title"],
                    "view": query.get("view"),
                    "html": format!("<h1>{}</h1>", m["title"].as_str().unwrap_or_default()),
                })),
                None => json_response(404, json!({"detail": "not found"})),
            },
            ("GET", ["search", "users"]) => {
                let needle = query.get("search_string").cloned().unwrap_or_default().to_lowercase();
                let hits: Vec<&User> = self
                    .users
                    .iter()
                    .filter(|u| u.name.to_lowercase().contains(&needle) || u.email.contains(&needle))
                    .collect();
                json_response(200, json!(hits))
            }
            _ => json_response(404, json!({"detail": "no route"})),
        }
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

#[async_trait]
impl Transport for StubService {
    async fn send(&self, request: &OutboundRequest) -> Result<RemoteResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if take_one(&self.tls_failures) {
            return Err(TransportError::new(TransportErrorKind::Tls, "certificate verify failed: unable to get local issuer"));
        }
        if take_one(&self.timeouts) {
            return Err(TransportError::new(TransportErrorKind::Timeout, "operation timed out"));
        }
        if let Some(canned) = self.canned.lock().pop_front() {
            return Ok(canned);
        }
        Ok(self.route(request))
    }

    fn refresh_certificates(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Delegates to a real client and counts every operation that reaches it.
pub struct CountingClient {
    inner: Arc<dyn PublishingClient>,
    calls: AtomicUsize,
}

impl CountingClient {
    pub fn new(inner: Arc<dyn PublishingClient>) -> Self { Self { inner, calls: AtomicUsize::new(0) } }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    fn tick(&self) { self.calls.fetch_add(1, Ordering::SeqCst); }
}

#[async_trait]
impl PublishingClient for CountingClient {
    async fn get_file_content(&self, who: &Identity, file: &PublishedFileIdentifier) -> PublishingResult<ContentsModel> {
        self.tick();
        self.inner.get_file_content(who, file).await
    }

    async fn get_file(&self, who: &Identity, file: &PublishedFileIdentifier, collaborators: bool) -> PublishingResult<PublishedFileMetadata> {
        self.tick();
        self.inner.get_file(who, file, collaborators).await
    }

    async fn get_files(&self, who: &Identity, author: &str) -> PublishingResult<Vec<Value>> {
        self.tick();
        self.inner.get_files(who, author).await
    }

    async fn publish_file(&self, who: &Identity, contents: ContentsModel) -> PublishingResult<PublishedFileMetadata> {
        self.tick();
        self.inner.publish_file(who, contents).await
    }

    async fn update_file(&self, who: &Identity, patch: PatchSharedFileModel) -> PublishingResult<PublishedFileMetadata> {
        self.tick();
        self.inner.update_file(who, patch).await
    }

    async fn remove_file(&self, who: &Identity, file: &PublishedFileIdentifier) -> PublishingResult<()> {
        self.tick();
        self.inner.remove_file(who, file).await
    }

    async fn preview_file(&self, who: &Identity, file: &PublishedFileIdentifier, view: &str) -> PublishingResult<Value> {
        self.tick();
        self.inner.preview_file(who, file, view).await
    }

    async fn download_file(&self, who: &Identity, file: &PublishedFileIdentifier) -> PublishingResult<()> {
        self.tick();
        self.inner.download_file(who, file).await
    }

    async fn search_collaborators(&self, who: &Identity, query: Option<&str>) -> PublishingResult<Vec<User>> {
        self.tick();
        self.inner.search_collaborators(who, query).await
    }
}

pub struct Fixture {
    pub stub: Arc<StubService>,
    pub index: Arc<MemoryIndex>,
    pub contents: TempDir,
    pub client: Arc<PublishingServiceClient>,
}

pub fn config() -> PublishingConfig {
    PublishingConfig::new(SERVICE_URL).unwrap()
}

pub fn fixture_with(config: PublishingConfig) -> Fixture {
    let stub = StubService::new();
    let index = Arc::new(MemoryIndex::new());
    let contents = tempfile::tempdir().unwrap();
    let store = Arc::new(FsContentStore::new(contents.path()));
    let client = Arc::new(PublishingServiceClient::new(Arc::new(config), stub.clone(), index.clone(), store));
    Fixture { stub, index, contents, client }
}

pub fn fixture() -> Fixture { fixture_with(config()) }

pub struct Harness {
    pub fixture: Fixture,
    pub counting: Arc<CountingClient>,
    pub app: Router,
}

pub fn harness() -> Harness {
    let fixture = fixture();
    let counting = Arc::new(CountingClient::new(fixture.client.clone()));
    let state = AppState {
        client: counting.clone(),
        index: fixture.index.clone(),
        auth: Arc::new(TokenAuthenticator::new().with_user(USER_TOKEN, ann())),
        config: Arc::new(config()),
    };
    Harness { app: server::router(state), fixture, counting }
}

pub struct Reply {
    pub status: StatusCode,
    pub bytes: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or_else(|e| panic!("body is not JSON ({e}): {:?}", String::from_utf8_lossy(&self.bytes)))
    }
}

pub async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("token {t}"));
    }
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();
    Reply { status, bytes }
}
