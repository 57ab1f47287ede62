//! Acting users and how inbound requests are resolved to them.
//! The host normally owns identity; this module only fixes the seam.

use std::collections::HashMap;

use axum::http::{header, HeaderMap};

use crate::models::User;

/// The user on whose behalf a request runs, plus the credential that may be
/// forwarded to the publishing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: User,
    pub token: Option<String>,
}

impl Identity {
    pub fn new(user: User) -> Self { Self { user, token: None } }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The author identity used for publishing: the user's email.
    pub fn author(&self) -> Option<&str> {
        let email = self.user.email.trim();
        if email.is_empty() { None } else { Some(email) }
    }
}

pub trait Authenticator: Send + Sync {
    /// `None` means the caller is not authenticated.
    fn authenticate(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// Static token table, checked against `Authorization: token <t>` or
/// `Authorization: Bearer <t>`.
#[derive(Debug, Default, Clone)]
pub struct TokenAuthenticator {
    tokens: HashMap<String, User>,
}

impl TokenAuthenticator {
    pub fn new() -> Self { Self::default() }

    pub fn with_user(mut self, token: impl Into<String>, user: User) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }
}

impl Authenticator for TokenAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = presented_token(headers)?;
        let user = self.tokens.get(token)?;
        Some(Identity::new(user.clone()).with_token(token))
    }
}

pub fn presented_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = raw.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token") {
        let token = token.trim();
        if token.is_empty() { None } else { Some(token) }
    } else {
        None
    }
}
