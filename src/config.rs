//! Process-wide settings, fixed at startup and shared read-only.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Url;

use crate::models::User;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// How to reach the remote publishing service.
#[derive(Debug, Clone)]
pub struct PublishingConfig {
    pub service_url: Url,
    /// Service-wide bearer token. When set it replaces every acting user's
    /// credential on outbound requests, so the remote side sees one account.
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    /// Identifier of this notebook server, stamped on create/patch payloads.
    pub notebook_server: Option<String>,
    pub verify_tls: bool,
}

impl PublishingConfig {
    pub fn new(service_url: &str) -> Result<Self> {
        let service_url = Url::parse(service_url).with_context(|| format!("invalid publishing service URL: {service_url}"))?;
        if service_url.cannot_be_a_base() {
            return Err(anyhow!("publishing service URL must be hierarchical: {service_url}"));
        }
        Ok(Self {
            service_url,
            api_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            notebook_server: None,
            verify_tls: true,
        })
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_notebook_server(mut self, id: impl Into<String>) -> Self {
        self.notebook_server = Some(id.into());
        self
    }

    /// PUBLISHING_URL (required), PUBLISHING_API_TOKEN, PUBLISHING_REQUEST_TIMEOUT
    /// (seconds), PUBLISHING_NOTEBOOK_SERVER, PUBLISHING_VERIFY_TLS.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("PUBLISHING_URL").context("PUBLISHING_URL is not set")?;
        let mut cfg = Self::new(&url)?;
        cfg.api_token = non_empty_env("PUBLISHING_API_TOKEN");
        if let Some(secs) = non_empty_env("PUBLISHING_REQUEST_TIMEOUT") {
            let secs: u64 = secs.parse().with_context(|| format!("PUBLISHING_REQUEST_TIMEOUT must be whole seconds, got '{secs}'"))?;
            cfg.request_timeout = Duration::from_secs(secs);
        }
        cfg.notebook_server = non_empty_env("PUBLISHING_NOTEBOOK_SERVER");
        if let Some(v) = non_empty_env("PUBLISHING_VERIFY_TLS") {
            cfg.verify_tls = parse_flag(&v).ok_or_else(|| anyhow!("PUBLISHING_VERIFY_TLS must be true or false, got '{v}'"))?;
        }
        Ok(cfg)
    }
}

/// Settings for the standalone binary.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub http_port: u16,
    /// Prefix the publishing routes are mounted under, e.g. `/` or `/lab`.
    pub base_url: String,
    pub contents_root: String,
    pub user_token: Option<String>,
    pub user: User,
}

impl ServerSettings {
    pub fn from_env() -> Result<Self> {
        let http_port = std::env::var("SHARING_HTTP_PORT").unwrap_or_else(|_| "8890".to_string());
        let http_port: u16 = http_port.parse().with_context(|| format!("SHARING_HTTP_PORT is not a port: {http_port}"))?;
        let base_url = std::env::var("SHARING_BASE_URL").unwrap_or_else(|_| "/".to_string());
        let contents_root = std::env::var("SHARING_CONTENTS_ROOT").unwrap_or_else(|_| ".".to_string());
        let user_name = std::env::var("SHARING_USER_NAME").unwrap_or_else(|_| whoami_fallback());
        let user = User {
            id: std::env::var("SHARING_USER_ID").unwrap_or_else(|_| user_name.clone()),
            email: std::env::var("SHARING_USER_EMAIL").unwrap_or_default(),
            name: user_name,
        };
        Ok(Self { http_port, base_url: normalize_base_url(&base_url), contents_root, user_token: non_empty_env("SHARING_USER_TOKEN"), user })
    }

    pub fn bind_addr(&self) -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], self.http_port)) }
}

fn whoami_fallback() -> String {
    std::env::var("USER").or_else(|_| std::env::var("USERNAME")).unwrap_or_else(|_| "anonymous".to_string())
}

/// `lab/` and `/lab/` both become `/lab`; empty becomes `/`.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() { "/".to_string() } else { format!("/{trimmed}") }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
