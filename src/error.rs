//! Error model for the publishing proxy.
//! `PublishingError` is what the client raises; `AppError` is the HTTP-facing
//! shape with a stable code per variant and a fixed status mapping.

use std::fmt::{Display, Formatter};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{FieldError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Certificate verification or any other TLS handshake failure.
    Tls,
    Timeout,
    Connect,
    Other,
}

impl Display for TransportErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransportErrorKind::Tls => "tls",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Other => "transport",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind} error talking to the publishing service: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new<S: Into<String>>(kind: TransportErrorKind, message: S) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn is_tls(&self) -> bool { self.kind == TransportErrorKind::Tls }
}

#[derive(Debug, Error)]
pub enum PublishingError {
    #[error("published file not found: {0}")]
    NotFound(String),
    #[error("published file already exists: {0}")]
    AlreadyExists(String),
    #[error("no publishing author is known for user '{0}'")]
    AuthorNotKnown(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unexpected response from the publishing service: {0}")]
    Schema(String),
    #[error("publishing service answered HTTP {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("local storage error: {0}")]
    Storage(#[from] std::io::Error),
}

pub type PublishingResult<T> = Result<T, PublishingError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    Invalid { code: String, message: String, fields: Vec<FieldError> },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Upstream { code: String, message: String },
    Timeout { code: String, message: String },
    Io { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Invalid { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Timeout { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Invalid { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::Timeout { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn upstream<S: Into<String>>(code: S, msg: S) -> Self { AppError::Upstream { code: code.into(), message: msg.into() } }
    pub fn timeout<S: Into<String>>(code: S, msg: S) -> Self { AppError::Timeout { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    pub fn invalid(err: ValidationError) -> Self {
        AppError::Invalid { code: "validation_error".into(), message: err.to_string(), fields: err.errors }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } | AppError::Invalid { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Upstream { .. } => 502,
            AppError::Timeout { .. } => 504,
            AppError::Io { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<PublishingError> for AppError {
    fn from(err: PublishingError) -> Self {
        let message = err.to_string();
        match err {
            PublishingError::NotFound(_) => AppError::not_found("not_found".into(), message),
            PublishingError::AlreadyExists(_) => AppError::conflict("already_exists".into(), message),
            PublishingError::AuthorNotKnown(_) => AppError::forbidden("author_not_known".into(), message),
            PublishingError::Validation(v) => AppError::invalid(v),
            PublishingError::Transport(t) if t.kind == TransportErrorKind::Timeout => {
                AppError::timeout("upstream_timeout".into(), message)
            }
            PublishingError::Transport(_) => AppError::upstream("transport_error".into(), message),
            PublishingError::Schema(_) => AppError::upstream("schema_error".into(), message),
            PublishingError::Remote { .. } => AppError::upstream("remote_error".into(), message),
            PublishingError::Storage(_) => AppError::io("storage_error".into(), message),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self { AppError::invalid(err) }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(target: "publishing", code = self.code_str(), "{}", self.message());
        } else {
            tracing::debug!(target: "publishing", code = self.code_str(), "{}", self.message());
        }
        let mut body = serde_json::json!({
            "status": "error",
            "code": self.code_str(),
            "message": self.message(),
        });
        if let AppError::Invalid { fields, .. } = &self {
            body["fields"] = serde_json::to_value(fields).unwrap_or_default();
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
