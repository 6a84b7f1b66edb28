//! Host contract consumed by the plugin.
//!
//! # Responsibilities
//! - Describe what the request hook may read from an inbound request
//! - Describe what the response hook may read and write on an upstream response
//!
//! # Design Decisions
//! - Headers are exposed as `http::HeaderMap` so rules work on real header types
//! - The body read is one-shot; a second read reports `BodyError::Consumed`

use axum::body::Bytes;
use axum::http::{HeaderMap, Request};
use std::future::Future;

/// Error reading or writing a response body through the host.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("response body already consumed")]
    Consumed,
    #[error("response body exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("failed to read response body: {0}")]
    Read(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to write response body: {0}")]
    Write(String),
}

/// Read access to an inbound request during the request phase.
pub trait GatewayRequest {
    fn method(&self) -> &str;

    /// Path and query as received.
    fn uri(&self) -> String;

    /// Value of a header, if present and valid UTF-8.
    fn header(&self, name: &str) -> Option<&str>;
}

impl<B> GatewayRequest for Request<B> {
    fn method(&self) -> &str {
        Request::method(self).as_str()
    }

    fn uri(&self) -> String {
        Request::uri(self)
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string())
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }
}

/// Access to an upstream response during the response phase.
pub trait GatewayResponse: Send {
    fn status(&self) -> u16;

    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Read the full upstream body. Only the first call can succeed.
    fn read_body(&mut self) -> impl Future<Output = Result<Bytes, BodyError>> + Send;

    /// Replace the body sent to the client.
    fn write_body(&mut self, body: Bytes) -> Result<(), BodyError>;
}
