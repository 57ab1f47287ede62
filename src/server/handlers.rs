use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::extract::{Authenticated, FileId, Validated};
use super::AppState;
use crate::client::{DEFAULT_AUTHOR, DEFAULT_VIEW};
use crate::error::{AppError, AppResult};
use crate::models::{ContentsModel, PatchSharedFileModel, PublishedFileIdentifier, PublishedFileMetadata, User, ValidationError};

#[derive(Debug, Deserialize)]
pub(crate) struct PathQuery {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthorQuery {
    author: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ViewQuery {
    view: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    search_string: Option<String>,
}

/// The URL's file id is authoritative; a body may repeat it but not contradict it.
fn reconcile_id(body_id: Option<&str>, url_id: &str) -> Result<(), AppError> {
    match body_id {
        Some(id) if !id.is_empty() && id != url_id => Err(AppError::invalid(ValidationError::field(
            "id",
            format!("'{id}' does not match the file id in the URL"),
        ))),
        _ => Ok(()),
    }
}

pub(crate) async fn get_file(
    State(state): State<AppState>,
    Authenticated(who): Authenticated,
    FileId(id): FileId,
) -> AppResult<Json<PublishedFileMetadata>> {
    let file = PublishedFileIdentifier::from_id(id);
    Ok(Json(state.client.get_file(&who, &file, true).await?))
}

pub(crate) async fn update_file(
    State(state): State<AppState>,
    Authenticated(who): Authenticated,
    FileId(id): FileId,
    Validated(mut patch): Validated<PatchSharedFileModel>,
) -> AppResult<(StatusCode, Json<PublishedFileMetadata>)> {
    reconcile_id(Some(patch.id.as_str()), &id)?;
    patch.id = id;
    let updated = state.client.update_file(&who, patch).await?;
    Ok((StatusCode::CREATED, Json(updated)))
}

pub(crate) async fn remove_file(
    State(state): State<AppState>,
    Authenticated(who): Authenticated,
    FileId(id): FileId,
) -> AppResult<StatusCode> {
    state.client.remove_file(&who, &PublishedFileIdentifier::from_id(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Published state of a local document. Unindexed paths are simply not
/// published: 204, and the remote service is never asked.
pub(crate) async fn file_for_path(
    State(state): State<AppState>,
    Authenticated(who): Authenticated,
    Query(query): Query<PathQuery>,
) -> AppResult<Response> {
    let Some(path) = query.path.filter(|p| !p.is_empty()) else {
        return Err(AppError::invalid(ValidationError::field("path", "query parameter required")));
    };
    let Some(id) = state.index.get_id(&path) else {
        debug!(target: "publishing", path = %path, "path is not tracking a published file");
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    let file = PublishedFileIdentifier::from_id(id);
    let metadata = state.client.get_file(&who, &file, false).await?;
    Ok(Json(metadata).into_response())
}

pub(crate) async fn list_files(
    State(state): State<AppState>,
    Authenticated(who): Authenticated,
    Query(query): Query<AuthorQuery>,
) -> AppResult<Json<Vec<Value>>> {
    let author = query.author.filter(|a| !a.is_empty());
    let files = state.client.get_files(&who, author.as_deref().unwrap_or(DEFAULT_AUTHOR)).await?;
    Ok(Json(files))
}

pub(crate) async fn publish_file(
    State(state): State<AppState>,
    Authenticated(who): Authenticated,
    Validated(contents): Validated<ContentsModel>,
) -> AppResult<(StatusCode, Json<PublishedFileMetadata>)> {
    let published = state.client.publish_file(&who, contents).await?;
    Ok((StatusCode::CREATED, Json(published)))
}

pub(crate) async fn download_file(
    State(state): State<AppState>,
    Authenticated(who): Authenticated,
    FileId(id): FileId,
    Validated(mut file): Validated<PublishedFileIdentifier>,
) -> AppResult<StatusCode> {
    reconcile_id(file.id.as_deref(), &id)?;
    file.id = Some(id);
    state.client.download_file(&who, &file).await?;
    Ok(StatusCode::CREATED)
}

pub(crate) async fn preview_file(
    State(state): State<AppState>,
    Authenticated(who): Authenticated,
    FileId(id): FileId,
    Query(query): Query<ViewQuery>,
) -> AppResult<Json<Value>> {
    let view = query.view.filter(|v| !v.is_empty());
    let file = PublishedFileIdentifier::from_id(id);
    let preview = state.client.preview_file(&who, &file, view.as_deref().unwrap_or(DEFAULT_VIEW)).await?;
    Ok(Json(preview))
}

pub(crate) async fn search_users(
    State(state): State<AppState>,
    Authenticated(who): Authenticated,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<User>>> {
    let Some(search) = query.search_string.filter(|s| !s.trim().is_empty()) else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(state.client.search_collaborators(&who, Some(&search)).await?))
}

/// Values the front end reads at startup.
pub(crate) async fn settings(State(state): State<AppState>, Authenticated(_who): Authenticated) -> Json<Value> {
    Json(serde_json::json!({ "publishingURL": state.config.service_url.as_str() }))
}
