//! Outbound wire to the publishing service.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use tracing::{debug, warn};

use crate::config::PublishingConfig;
use crate::error::{TransportError, TransportErrorKind};

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RemoteResponse {
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }

    /// Body as text, cut down for log lines and error messages.
    pub fn snippet(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let mut out: String = text.chars().take(200).collect();
        if text.chars().count() > 200 { out.push_str("..."); }
        out
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<RemoteResponse, TransportError>;

    /// Reload certificate state after a TLS failure. Default: nothing to do.
    fn refresh_certificates(&self) {}
}

/// `reqwest`-backed transport. The inner client is swapped out wholesale when
/// certificates need to be reloaded.
pub struct ReqwestTransport {
    client: RwLock<reqwest::Client>,
    timeout: Duration,
    verify_tls: bool,
}

impl ReqwestTransport {
    pub fn new(config: &PublishingConfig) -> Result<Self, TransportError> {
        let client = build_client(config.request_timeout, config.verify_tls)?;
        Ok(Self { client: RwLock::new(client), timeout: config.request_timeout, verify_tls: config.verify_tls })
    }
}

fn build_client(timeout: Duration, verify_tls: bool) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(!verify_tls)
        .build()
        .map_err(|e| TransportError::new(TransportErrorKind::Other, format!("failed to build HTTP client: {e}")))
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<RemoteResponse, TransportError> {
        let client = self.client.read().clone();
        let mut builder = client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .timeout(self.timeout);
        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| TransportError::new(TransportErrorKind::Other, format!("failed to encode body: {e}")))?;
            builder = builder.body(bytes);
        }
        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?.to_vec();
        debug!(target: "publishing", status, bytes = body.len(), "remote response");
        Ok(RemoteResponse { status, body })
    }

    fn refresh_certificates(&self) {
        match build_client(self.timeout, self.verify_tls) {
            Ok(fresh) => *self.client.write() = fresh,
            Err(e) => warn!(target: "publishing", "keeping existing HTTP client, rebuild failed: {e}"),
        }
    }
}

/// Sort a `reqwest` failure into the kinds the client treats differently.
/// Only the causes below reqwest's own wrapper are inspected: the wrapper's
/// message embeds the request URL, which is caller data.
pub fn classify(err: reqwest::Error) -> TransportError {
    let message = error_chain(&err);
    let err = err.without_url();
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.source().is_some_and(is_tls_failure) {
        TransportErrorKind::Tls
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, message)
}

/// TLS failures surface from the TLS backend as connect errors. rustls
/// reports them as `InvalidData` I/O errors; other backends only say so in
/// the wording of the chain.
fn is_tls_failure(err: &(dyn StdError + 'static)) -> bool {
    const MARKERS: &[&str] = &["certificate", "tls", "ssl", "handshake", "unknownissuer"];
    std::iter::successors(Some(err), |e| (*e).source()).any(|e| {
        let invalid_data = e.downcast_ref::<io::Error>().is_some_and(|io| io.kind() == io::ErrorKind::InvalidData);
        let text = e.to_string().to_ascii_lowercase();
        invalid_data || MARKERS.iter().any(|m| text.contains(m))
    })
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        parts.push(e.to_string());
        current = e.source();
    }
    parts.join(": ")
}
