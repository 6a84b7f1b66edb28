//! Records exchanged between the plugin stages.

use axum::body::Bytes;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Content type assumed when the external endpoint does not send one.
pub const DEFAULT_EXTERNAL_CONTENT_TYPE: &str = "application/json";

/// Upstream response headers copied into the external payload.
pub const UPSTREAM_HEADER_ALLOW_LIST: [&str; 16] = [
    "Content-Type",
    "Content-Length",
    "Content-Encoding",
    "Cache-Control",
    "ETag",
    "Last-Modified",
    "Expires",
    "Access-Control-Allow-Origin",
    "Access-Control-Allow-Credentials",
    "Transfer-Encoding",
    "Vary",
    "Set-Cookie",
    "Server",
    "X-Powered-By",
    "X-Frame-Options",
    "X-Content-Type-Options",
];

const NOTIFY_MESSAGE: &str = "Upstream response data from gateway plugin (notify mode)";
const REPLACE_MESSAGE: &str = "Upstream response data from gateway plugin";

/// Request context captured in the request phase and claimed in the response phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Nanosecond timestamp, strictly increasing per store.
    pub id: u64,
    /// Per-exchange token stamped by the host, if it provides one.
    pub token: Option<String>,
    pub uri: String,
    pub method: String,
    pub client_ip: String,
    /// Captured values of the configured forward headers.
    pub forwarded_headers: HashMap<String, String>,
}

impl PendingRequest {
    /// Context used when no pending request could be claimed.
    pub fn unknown() -> Self {
        Self {
            id: 0,
            token: None,
            uri: "/unknown".to_string(),
            method: "GET".to_string(),
            client_ip: "unknown".to_string(),
            forwarded_headers: HashMap::new(),
        }
    }
}

/// JSON document sent to the external endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPayload {
    pub upstream_status: u16,
    pub upstream_headers: HashMap<String, String>,
    pub upstream_body: String,
    pub request_uri: String,
    pub request_method: String,
    pub client_ip: String,
    pub timestamp: i64,
    pub message: String,
}

impl ExternalPayload {
    /// Build the payload for notify mode, where the upstream body is never read.
    pub fn for_notify(status: u16, headers: &HeaderMap, request: &PendingRequest) -> Self {
        Self::build(status, headers, String::new(), request, NOTIFY_MESSAGE)
    }

    /// Build the payload for replace mode, carrying the upstream body.
    pub fn for_replace(status: u16, headers: &HeaderMap, body: &[u8], request: &PendingRequest) -> Self {
        let body = String::from_utf8_lossy(body).into_owned();
        Self::build(status, headers, body, request, REPLACE_MESSAGE)
    }

    fn build(
        status: u16,
        headers: &HeaderMap,
        upstream_body: String,
        request: &PendingRequest,
        message: &str,
    ) -> Self {
        Self {
            upstream_status: status,
            upstream_headers: allow_listed_headers(headers),
            upstream_body,
            request_uri: request.uri.clone(),
            request_method: request.method.clone(),
            client_ip: request.client_ip.clone(),
            timestamp: unix_seconds(),
            message: message.to_string(),
        }
    }
}

/// Outcome of the external call as seen by header rules and body selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExternalResult {
    pub success: bool,
    /// Endpoint body exactly as received.
    pub body: Bytes,
    pub content_type: String,
}

impl ExternalResult {
    /// Uniform result for every kind of external failure.
    pub fn failure() -> Self {
        Self::default()
    }
}

/// Copy the allow-listed headers that carry a non-empty value.
pub fn allow_listed_headers(headers: &HeaderMap) -> HashMap<String, String> {
    UPSTREAM_HEADER_ALLOW_LIST
        .iter()
        .filter_map(|name| {
            headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
}

fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
