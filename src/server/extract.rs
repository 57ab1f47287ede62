//! Request pipeline stages, run by axum in argument order before a handler
//! body: authenticate, check the file id, then validate the JSON body.

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use once_cell::sync::Lazy;
use regex::Regex;

use super::AppState;
use crate::error::AppError;
use crate::identity::Identity;
use crate::models::{Ingest, ValidationError};

/// Five dash-separated word groups, the content index's id format.
static FILE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+-\w+-\w+-\w+-\w+$").expect("static regex"));

pub fn is_file_id(raw: &str) -> bool { FILE_ID_RE.is_match(raw) }

/// The authenticated caller. Rejects with 401 before anything else runs.
pub struct Authenticated(pub Identity);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state
            .auth
            .authenticate(&parts.headers)
            .map(Authenticated)
            .ok_or_else(|| AppError::auth("unauthorized", "authentication required"))
    }
}

/// `{file_id}` path segment. Anything not shaped like a file id is treated
/// as an unknown route.
pub struct FileId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for FileId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::not_found("not_found".to_string(), e.body_text()))?;
        if is_file_id(&raw) {
            Ok(FileId(raw))
        } else {
            Err(AppError::not_found("not_found".to_string(), format!("no such route for file id '{raw}'")))
        }
    }
}

/// A JSON body that passed the model's field checks.
pub struct Validated<T>(pub T);

impl<S, T> FromRequest<S> for Validated<T>
where
    S: Send + Sync,
    T: Ingest + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::user("bad_body".to_string(), e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::invalid(ValidationError::field("$", "request body is required")));
        }
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::user("malformed_json".to_string(), format!("body is not valid JSON: {e}")))?;
        T::ingest(value).map(Validated).map_err(AppError::invalid)
    }
}
