//!
//! Publishing HTTP API
//! -------------------
//! Axum routes exposing the publishing client to the notebook front end.
//! Handlers are mounted under `/publishing` and expect the host to nest the
//! router under its own base URL.
//!
//! Every route requires an authenticated caller. Body-bearing routes validate
//! their body before the client is touched.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::client::{PublishingClient, PublishingServiceClient};
use crate::config::{PublishingConfig, ServerSettings};
use crate::content::{ContentIndex, FsContentStore, MemoryIndex};
use crate::identity::{Authenticator, TokenAuthenticator};

pub mod extract;
mod handlers;

/// Shared state injected into all handlers. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn PublishingClient>,
    /// Local content index, consulted directly by the path lookup route.
    pub index: Arc<dyn ContentIndex>,
    pub auth: Arc<dyn Authenticator>,
    pub config: Arc<PublishingConfig>,
}

/// Publishing routes, rooted at `/publishing`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/publishing", get(handlers::list_files).post(handlers::publish_file))
        .route("/publishing/file", get(handlers::file_for_path))
        .route("/publishing/settings", get(handlers::settings))
        .route("/publishing/search/users", get(handlers::search_users))
        .route(
            "/publishing/{file_id}",
            get(handlers::get_file).patch(handlers::update_file).delete(handlers::remove_file),
        )
        .route("/publishing/{file_id}/download", post(handlers::download_file))
        .route("/publishing/{file_id}/preview", get(handlers::preview_file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Mount the publishing routes under `base_url` (already normalized).
pub fn mount(base_url: &str, state: AppState) -> Router {
    if base_url == "/" {
        router(state)
    } else {
        Router::new().nest(base_url, router(state))
    }
}

fn log_startup(settings: &ServerSettings, config: &PublishingConfig) {
    info!(
        target: "startup",
        "notebook-sharing starting: http_port={}, base_url='{}', contents_root='{}', publishing_url='{}', timeout_secs={}, service_token={}, verify_tls={}",
        settings.http_port,
        settings.base_url,
        settings.contents_root,
        config.service_url,
        config.request_timeout.as_secs(),
        config.api_token.is_some(),
        config.verify_tls,
    );
    if config.api_token.is_some() {
        warn!(target: "startup", "service-wide token is set: remote requests will not carry per-user identity");
    }
}

/// Standalone entry: in-memory index, filesystem store, one static user.
pub async fn run(settings: ServerSettings, config: PublishingConfig) -> anyhow::Result<()> {
    log_startup(&settings, &config);
    let config = Arc::new(config);
    let index = Arc::new(MemoryIndex::new());
    let store = Arc::new(FsContentStore::new(&settings.contents_root));
    let client = PublishingServiceClient::connect(config.clone(), index.clone(), store)
        .context("while building the publishing client")?;

    let token = match &settings.user_token {
        Some(t) => t.clone(),
        None => {
            let generated = uuid::Uuid::new_v4().simple().to_string();
            info!(target: "startup", "no SHARING_USER_TOKEN set; generated token for {}: {}", settings.user.name, generated);
            generated
        }
    };
    if settings.user.email.is_empty() {
        warn!(target: "startup", "SHARING_USER_EMAIL is empty; publishing will fail with author_not_known");
    }
    let auth = TokenAuthenticator::new().with_user(token, settings.user.clone());

    let state = AppState { client: Arc::new(client), index, auth: Arc::new(auth), config };
    let app = mount(&settings.base_url, state);

    let addr: SocketAddr = settings.bind_addr();
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
