//! Upstream response adapter handed to the response hook.
//!
//! # Responsibilities
//! - Expose status and headers of the upstream response
//! - Allow exactly one size-limited full body read
//! - Accept a replacement body and rebuild the client response
//!
//! # Design Decisions
//! - The body stays a stream unless the plugin reads it, so notify mode never buffers
//! - A failed read leaves the body empty; the client gets whatever headers were set

use axum::body::{Body, Bytes};
use axum::http::response::Parts;
use axum::http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::HeaderMap;
use axum::response::Response;
use http_body_util::BodyExt;

use crate::plugin::gateway::{BodyError, GatewayResponse};

/// An upstream response in flight between the upstream and the client.
pub struct UpstreamResponse {
    parts: Parts,
    body: Option<Body>,
    body_limit: usize,
}

impl UpstreamResponse {
    pub fn new(response: Response<Body>, body_limit: usize) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            parts,
            body: Some(body),
            body_limit,
        }
    }

    /// Rebuild the response sent to the client.
    ///
    /// A body consumed by a failed read goes out empty, without the upstream
    /// framing headers.
    pub fn into_response(mut self) -> Response {
        let body = match self.body.take() {
            Some(body) => body,
            None => {
                self.parts.headers.remove(CONTENT_LENGTH);
                self.parts.headers.remove(TRANSFER_ENCODING);
                Body::empty()
            }
        };
        Response::from_parts(self.parts, body)
    }
}

impl GatewayResponse for UpstreamResponse {
    fn status(&self) -> u16 {
        self.parts.status.as_u16()
    }

    fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.parts.headers
    }

    async fn read_body(&mut self) -> Result<Bytes, BodyError> {
        let body = self.body.take().ok_or(BodyError::Consumed)?;
        let limited = http_body_util::Limited::new(body, self.body_limit);

        match limited.collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) if e.is::<http_body_util::LengthLimitError>() => Err(BodyError::TooLarge {
                limit: self.body_limit,
            }),
            Err(e) => Err(BodyError::Read(e)),
        }
    }

    fn write_body(&mut self, body: Bytes) -> Result<(), BodyError> {
        self.body = Some(Body::from(body));
        Ok(())
    }
}
