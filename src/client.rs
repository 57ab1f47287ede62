//!
//! Publishing service client
//! -------------------------
//! Turns local operations (publish, fetch, update, delete, preview, download,
//! collaborator search) into requests against the remote publishing service.
//!
//! Responsibilities:
//! - Resolve local paths to remote ids through the injected content index.
//! - Build the bearer header (service-wide token first, then the user's).
//! - Retry once after a TLS failure; never retry anything else.
//! - Map remote statuses and bodies into typed results or `PublishingError`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::PublishingConfig;
use crate::content::{ContentIndex, ContentStore};
use crate::error::{PublishingError, PublishingResult, TransportError};
use crate::identity::Identity;
use crate::models::{
    id_from_link, ContentsModel, CreateSharedFileModel, PatchSharedFileModel, PublishedFileIdentifier,
    PublishedFileMetadata, User, ValidationError,
};

pub mod transport;

pub use transport::{OutboundRequest, RemoteResponse, ReqwestTransport, Transport};

pub const DEFAULT_VIEW: &str = "full";
pub const DEFAULT_AUTHOR: &str = "me";

/// Operations the route handlers need from the publishing service.
#[async_trait]
pub trait PublishingClient: Send + Sync {
    async fn get_file_content(&self, who: &Identity, file: &PublishedFileIdentifier) -> PublishingResult<ContentsModel>;

    async fn get_file(
        &self,
        who: &Identity,
        file: &PublishedFileIdentifier,
        collaborators: bool,
    ) -> PublishingResult<PublishedFileMetadata>;

    /// Summaries of every file published by `author`, in the service's order.
    async fn get_files(&self, who: &Identity, author: &str) -> PublishingResult<Vec<Value>>;

    async fn publish_file(&self, who: &Identity, contents: ContentsModel) -> PublishingResult<PublishedFileMetadata>;

    async fn update_file(&self, who: &Identity, patch: PatchSharedFileModel) -> PublishingResult<PublishedFileMetadata>;

    async fn remove_file(&self, who: &Identity, file: &PublishedFileIdentifier) -> PublishingResult<()>;

    async fn preview_file(&self, who: &Identity, file: &PublishedFileIdentifier, view: &str) -> PublishingResult<Value>;

    /// Fetch a published file and write it into local storage.
    async fn download_file(&self, who: &Identity, file: &PublishedFileIdentifier) -> PublishingResult<()>;

    /// Empty or absent queries return no users without a remote call.
    async fn search_collaborators(&self, who: &Identity, query: Option<&str>) -> PublishingResult<Vec<User>>;
}

pub struct PublishingServiceClient {
    config: Arc<PublishingConfig>,
    transport: Arc<dyn Transport>,
    index: Arc<dyn ContentIndex>,
    store: Arc<dyn ContentStore>,
}

impl PublishingServiceClient {
    pub fn new(
        config: Arc<PublishingConfig>,
        transport: Arc<dyn Transport>,
        index: Arc<dyn ContentIndex>,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        Self { config, transport, index, store }
    }

    /// Client over the real HTTP transport.
    pub fn connect(
        config: Arc<PublishingConfig>,
        index: Arc<dyn ContentIndex>,
        store: Arc<dyn ContentStore>,
    ) -> Result<Self, TransportError> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::new(config, transport, index, store))
    }

    pub fn config(&self) -> &PublishingConfig { &self.config }

    /// Headers for one request. The configured service token beats the
    /// acting user's credential.
    pub fn headers_for(&self, who: &Identity) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json;charset=UTF-8"));
        let token = self.config.api_token.as_deref().or(who.token.as_deref());
        match token.and_then(|t| HeaderValue::from_str(&format!("Bearer {t}")).ok()) {
            Some(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            None => warn!(target: "publishing", user = %who.user.id, "no usable credential for publishing request"),
        }
        headers
    }

    /// `segments` are appended to the service URL as path segments (and
    /// percent-encoded); `query` pairs are encoded the same way.
    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> PublishingResult<Url> {
        let mut url = self.config.service_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| PublishingError::Schema(format!("service URL cannot take a path: {}", self.config.service_url)))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Send once; on a TLS failure refresh certificates and send exactly once more.
    async fn execute(&self, request: OutboundRequest) -> PublishingResult<RemoteResponse> {
        debug!(target: "publishing", method = %request.method, url = %request.url, "publishing request");
        match self.transport.send(&request).await {
            Err(e) if e.is_tls() => {
                warn!(target: "publishing", url = %request.url, "TLS failure, refreshing certificates and retrying once: {e}");
                self.transport.refresh_certificates();
                Ok(self.transport.send(&request).await?)
            }
            other => Ok(other?),
        }
    }

    async fn call(
        &self,
        who: &Identity,
        method: Method,
        url: Url,
        body: Option<Value>,
        subject: &str,
    ) -> PublishingResult<RemoteResponse> {
        let request = OutboundRequest { method, url, headers: self.headers_for(who), body };
        let response = self.execute(request).await?;
        check_status(response, subject)
    }

    /// Resolve an identifier to a remote id: id, then shareable link, then
    /// the content index entry for the path.
    pub fn resolve_id(&self, file: &PublishedFileIdentifier) -> PublishingResult<String> {
        if let Some(id) = file.id.as_deref().filter(|s| !s.is_empty()) {
            return Ok(id.to_string());
        }
        if let Some(link) = file.shareable_link.as_deref() {
            return id_from_link(link)
                .ok_or_else(|| ValidationError::field("shareable_link", "link does not name a file").into());
        }
        if let Some(path) = file.path.as_deref() {
            return self.index.get_id(path).ok_or_else(|| PublishingError::NotFound(format!("no published file for path {path}")));
        }
        Err(ValidationError::field("id", "one of id, shareable_link or path is required").into())
    }
}

fn check_status(response: RemoteResponse, subject: &str) -> PublishingResult<RemoteResponse> {
    if response.is_success() {
        return Ok(response);
    }
    match response.status {
        404 => Err(PublishingError::NotFound(subject.to_string())),
        409 => Err(PublishingError::AlreadyExists(subject.to_string())),
        status => {
            let message = response.snippet();
            warn!(target: "publishing", status, subject, "publishing service rejected request: {message}");
            Err(PublishingError::Remote { status, message })
        }
    }
}

fn parse_body<T: DeserializeOwned>(response: &RemoteResponse) -> PublishingResult<T> {
    serde_json::from_slice(&response.body).map_err(|e| PublishingError::Schema(e.to_string()))
}

#[async_trait]
impl PublishingClient for PublishingServiceClient {
    async fn get_file_content(&self, who: &Identity, file: &PublishedFileIdentifier) -> PublishingResult<ContentsModel> {
        let id = self.resolve_id(file)?;
        let url = self.url(&["sharing", &id], &[("content", "true")])?;
        let response = self.call(who, Method::GET, url, None, &id).await?;
        let metadata: PublishedFileMetadata = parse_body(&response)?;
        metadata.contents.ok_or_else(|| PublishingError::Schema(format!("file {id} came back without contents")))
    }

    async fn get_file(
        &self,
        who: &Identity,
        file: &PublishedFileIdentifier,
        collaborators: bool,
    ) -> PublishingResult<PublishedFileMetadata> {
        let id = self.resolve_id(file)?;
        let query: &[(&str, &str)] = if collaborators { &[] } else { &[("collaborators", "False")] };
        let url = self.url(&["sharing", &id], query)?;
        let response = self.call(who, Method::GET, url, None, &id).await?;
        parse_body(&response)
    }

    async fn get_files(&self, who: &Identity, author: &str) -> PublishingResult<Vec<Value>> {
        let url = self.url(&["sharing"], &[("author", author)])?;
        let response = self.call(who, Method::GET, url, None, author).await?;
        let mut listing: Value = parse_body(&response)?;
        match listing.get_mut("files").map(Value::take) {
            Some(Value::Array(files)) => Ok(files),
            _ => Err(PublishingError::Schema("listing has no 'files' array".to_string())),
        }
    }

    async fn publish_file(&self, who: &Identity, contents: ContentsModel) -> PublishingResult<PublishedFileMetadata> {
        let author = who.author().ok_or_else(|| PublishingError::AuthorNotKnown(who.user.id.clone()))?.to_string();
        let id = self.index.index(&contents.path)?;
        let create = CreateSharedFileModel {
            id: id.clone(),
            author,
            title: Some(contents.name.clone()),
            collaborators: None,
            contents,
            notebook_server: self.config.notebook_server.clone(),
        };
        let body = serde_json::to_value(&create).map_err(|e| PublishingError::Schema(e.to_string()))?;
        let url = self.url(&["sharing"], &[])?;
        let response = self.call(who, Method::POST, url, Some(body), &id).await?;
        let published: PublishedFileMetadata = parse_body(&response)?;
        info!(target: "publishing", id = %published.id, path = %create.contents.path, "published file");
        Ok(published)
    }

    async fn update_file(&self, who: &Identity, mut patch: PatchSharedFileModel) -> PublishingResult<PublishedFileMetadata> {
        if patch.id.is_empty() {
            return Err(ValidationError::field("id", "field required").into());
        }
        if self.config.notebook_server.is_some() {
            patch.notebook_server = self.config.notebook_server.clone();
        }
        let id = patch.id.clone();
        let body = serde_json::to_value(&patch).map_err(|e| PublishingError::Schema(e.to_string()))?;
        let url = self.url(&["sharing", &id], &[])?;
        let response = self.call(who, Method::PATCH, url, Some(body), &id).await?;
        parse_body(&response)
    }

    async fn remove_file(&self, who: &Identity, file: &PublishedFileIdentifier) -> PublishingResult<()> {
        let id = self.resolve_id(file)?;
        let url = self.url(&["sharing", &id], &[])?;
        self.call(who, Method::DELETE, url, None, &id).await?;
        info!(target: "publishing", id = %id, "removed published file");
        Ok(())
    }

    async fn preview_file(&self, who: &Identity, file: &PublishedFileIdentifier, view: &str) -> PublishingResult<Value> {
        let id = self.resolve_id(file)?;
        let url = self.url(&["sharing", &id, "preview"], &[("view", view)])?;
        let response = self.call(who, Method::GET, url, None, &id).await?;
        parse_body(&response)
    }

    async fn download_file(&self, who: &Identity, file: &PublishedFileIdentifier) -> PublishingResult<()> {
        let contents = self.get_file_content(who, file).await?;
        let target = file.path.clone().unwrap_or_else(|| contents.path.clone());
        self.store.save(&contents, &target).await?;
        info!(target: "publishing", path = %target, "downloaded published file");
        Ok(())
    }

    async fn search_collaborators(&self, who: &Identity, query: Option<&str>) -> PublishingResult<Vec<User>> {
        let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
            return Ok(Vec::new());
        };
        let url = self.url(&["search", "users"], &[("search_string", query)])?;
        let response = self.call(who, Method::GET, url, None, query).await?;
        parse_body(&response)
    }
}
