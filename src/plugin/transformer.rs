//! Response phase orchestration.
//!
//! # States
//! ```text
//! Received ──mode──▶ Notify ──────────────────▶ Called ─▶ Emitting ─▶ Done
//!             └────▶ Replace ─(read body)─────▶ Called ─▶ Emitting ─▶ Done
//!                        └─ read failed ─▶ Done (response left as is)
//! ```
//!
//! # Emitting
//! - Notify: header rules only; body and Content-Type untouched
//! - Replace, success with a body: external body, external (or configured) Content-Type
//! - Replace, otherwise: original body, sniffed Content-Type
//!
//! Content-Length and Transfer-Encoding are dropped whenever replace mode writes a body.

use axum::body::Bytes;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::HeaderValue;
use std::sync::Arc;

use crate::config::schema::{PluginConfig, TransformMode};
use crate::plugin::capture::capture_request;
use crate::plugin::correlation::CorrelationStore;
use crate::plugin::gateway::{GatewayRequest, GatewayResponse};
use crate::plugin::headers::apply_header_rules;
use crate::plugin::notifier::{HttpNotifier, Notifier};
use crate::plugin::payload::{ExternalPayload, ExternalResult, PendingRequest};
use crate::plugin::sniff::detect_content_type;

/// One activated plugin instance: an immutable config plus shared collaborators.
#[derive(Debug)]
pub struct ResponseTransformer<N = HttpNotifier> {
    config: Arc<PluginConfig>,
    store: Arc<CorrelationStore>,
    notifier: Arc<N>,
    token_header: Option<String>,
}

impl<N: Notifier> ResponseTransformer<N> {
    pub fn new(config: Arc<PluginConfig>, store: Arc<CorrelationStore>, notifier: Arc<N>) -> Self {
        Self {
            config,
            store,
            notifier,
            token_header: None,
        }
    }

    /// Correlate by this request header when the host stamps one per exchange.
    pub fn with_token_header(mut self, header: impl Into<String>) -> Self {
        let header = header.into();
        self.token_header = (!header.is_empty()).then_some(header);
        self
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Request hook: capture context for the later response.
    ///
    /// Returns the id of the captured context.
    pub fn request_filter<R: GatewayRequest + ?Sized>(&self, request: &R) -> u64 {
        capture_request(
            request,
            &self.config.forward_headers,
            self.token_header.as_deref(),
            &self.store,
        )
    }

    /// Forget a captured context whose exchange failed before a response arrived.
    pub fn abandon(&self, id: u64) {
        if self.store.remove(id).is_some() {
            tracing::debug!(id, "Discarded context of failed exchange");
        }
    }

    /// Response hook: call the external endpoint and shape the response.
    ///
    /// `token` is the exchange token the host stamped on the request, if any.
    pub async fn response_filter<R: GatewayResponse>(&self, response: &mut R, token: Option<&str>) {
        let request = self.claim(token);

        tracing::debug!(mode = ?self.config.mode, status = response.status(), "Processing upstream response");

        match self.config.mode {
            TransformMode::Notify => self.handle_notify(response, &request).await,
            TransformMode::Replace => self.handle_replace(response, &request).await,
        }
    }

    fn claim(&self, token: Option<&str>) -> PendingRequest {
        let token = if self.token_header.is_some() { token } else { None };
        match self.store.claim(token) {
            (Some(pending), outcome) => {
                tracing::debug!(
                    id = pending.id,
                    outcome = outcome.as_str(),
                    forwarded = pending.forwarded_headers.len(),
                    "Matched pending request"
                );
                pending
            }
            (None, outcome) => {
                tracing::warn!(outcome = outcome.as_str(), "No matching request context, using defaults");
                PendingRequest::unknown()
            }
        }
    }

    async fn handle_notify<R: GatewayResponse>(&self, response: &mut R, request: &PendingRequest) {
        let payload = ExternalPayload::for_notify(response.status(), response.headers(), request);
        let result = self.call(&payload, request).await;

        apply_header_rules(&self.config.response_headers, response.headers_mut(), result.success);
        tracing::info!(success = result.success, "Notify mode: upstream response passed through");
    }

    async fn handle_replace<R: GatewayResponse>(&self, response: &mut R, request: &PendingRequest) {
        let body = match response.read_body().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read upstream response body");
                return;
            }
        };

        let payload = ExternalPayload::for_replace(response.status(), response.headers(), &body, request);
        let result = self.call(&payload, request).await;

        apply_header_rules(&self.config.response_headers, response.headers_mut(), result.success);
        self.emit(response, result, body);
    }

    async fn call(&self, payload: &ExternalPayload, request: &PendingRequest) -> ExternalResult {
        self.notifier
            .notify(
                &self.config,
                payload,
                &request.forwarded_headers,
                self.config.timeout_duration(),
            )
            .await
    }

    fn emit<R: GatewayResponse>(&self, response: &mut R, result: ExternalResult, original: Bytes) {
        let headers = response.headers_mut();
        headers.remove(CONTENT_LENGTH);
        headers.remove(TRANSFER_ENCODING);

        let (content_type, body, source) = if result.success && !result.body.is_empty() {
            let content_type = if result.content_type.is_empty() {
                self.config.content_type.clone()
            } else {
                result.content_type
            };
            (content_type, result.body, "external")
        } else {
            (detect_content_type(&original).to_string(), original, "original")
        };

        match HeaderValue::from_str(&content_type) {
            Ok(value) => {
                headers.insert(CONTENT_TYPE, value);
            }
            Err(e) => {
                tracing::warn!(content_type = %content_type, error = %e, "Unusable content type, keeping upstream value");
            }
        }

        let bytes = body.len();
        match response.write_body(body) {
            Ok(()) => tracing::info!(source, content_type = %content_type, bytes, "Replace mode: response body written"),
            Err(e) => tracing::error!(source, error = %e, "Failed to write response body"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CorrelationConfig, HeaderRule, HeaderRuleMode};
    use crate::plugin::gateway::BodyError;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeNotifier {
        result: ExternalResult,
        calls: Mutex<Vec<(ExternalPayload, HashMap<String, String>, Duration)>>,
    }

    impl Notifier for FakeNotifier {
        async fn notify(
            &self,
            _config: &PluginConfig,
            payload: &ExternalPayload,
            forward_headers: &HashMap<String, String>,
            deadline: Duration,
        ) -> ExternalResult {
            self.calls
                .lock()
                .unwrap()
                .push((payload.clone(), forward_headers.clone(), deadline));
            self.result.clone()
        }
    }

    struct FakeResponse {
        status: u16,
        headers: HeaderMap,
        body: Option<Bytes>,
        reads: usize,
        written: Option<Bytes>,
    }

    impl FakeResponse {
        fn json(body: &'static str) -> Self {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
            Self {
                status: 200,
                headers,
                body: Some(Bytes::from_static(body.as_bytes())),
                reads: 0,
                written: None,
            }
        }
    }

    impl GatewayResponse for FakeResponse {
        fn status(&self) -> u16 {
            self.status
        }

        fn headers(&self) -> &HeaderMap {
            &self.headers
        }

        fn headers_mut(&mut self) -> &mut HeaderMap {
            &mut self.headers
        }

        async fn read_body(&mut self) -> Result<Bytes, BodyError> {
            self.reads += 1;
            self.body.take().ok_or(BodyError::Consumed)
        }

        fn write_body(&mut self, body: Bytes) -> Result<(), BodyError> {
            self.written = Some(body);
            Ok(())
        }
    }

    fn plugin(mode: TransformMode) -> PluginConfig {
        PluginConfig {
            external_api_url: "http://hooks.local".to_string(),
            timeout: 750,
            forward_headers: vec!["X-Token".to_string()],
            method: "POST".to_string(),
            mode,
            content_type: "application/json".to_string(),
            response_headers: vec![HeaderRule {
                name: "X-Checked".to_string(),
                mode: HeaderRuleMode::Replace,
                success_value: "ok".to_string(),
                failure_value: "failed".to_string(),
            }],
        }
    }

    fn transformer(mode: TransformMode, result: ExternalResult) -> ResponseTransformer<FakeNotifier> {
        ResponseTransformer::new(
            Arc::new(plugin(mode)),
            Arc::new(CorrelationStore::new(&CorrelationConfig::default())),
            Arc::new(FakeNotifier {
                result,
                ..FakeNotifier::default()
            }),
        )
    }

    fn success(body: &str, content_type: &str) -> ExternalResult {
        ExternalResult {
            success: true,
            body: Bytes::copy_from_slice(body.as_bytes()),
            content_type: content_type.to_string(),
        }
    }

    #[tokio::test]
    async fn test_notify_never_reads_body() {
        let plugin = transformer(TransformMode::Notify, success("ignored", "text/plain"));
        let request = Request::builder()
            .uri("/items")
            .header("X-Token", "abc")
            .body(Body::empty())
            .unwrap();
        plugin.request_filter(&request);

        let mut response = FakeResponse::json("{\"a\":1}");
        plugin.response_filter(&mut response, None).await;

        assert_eq!(response.reads, 0);
        assert!(response.written.is_none());
        assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert!(response.headers.contains_key(CONTENT_LENGTH));
        assert_eq!(response.headers.get("x-checked").unwrap(), "ok");

        let calls = plugin.notifier.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (payload, forwarded, deadline) = &calls[0];
        assert!(payload.upstream_body.is_empty());
        assert_eq!(payload.request_uri, "/items");
        assert_eq!(forwarded.get("X-Token").unwrap(), "abc");
        assert_eq!(*deadline, Duration::from_millis(750));
    }

    #[tokio::test]
    async fn test_replace_with_external_body() {
        let plugin = transformer(TransformMode::Replace, success("<result>x</result>", "application/xml"));
        let mut response = FakeResponse::json("{\"a\":1}");
        response.headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        plugin.response_filter(&mut response, None).await;

        assert_eq!(response.reads, 1);
        assert_eq!(response.written.as_deref(), Some(&b"<result>x</result>"[..]));
        assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "application/xml");
        assert!(!response.headers.contains_key(CONTENT_LENGTH));
        assert!(!response.headers.contains_key(TRANSFER_ENCODING));

        let calls = plugin.notifier.calls.lock().unwrap();
        assert_eq!(calls[0].0.upstream_body, "{\"a\":1}");
        assert_eq!(calls[0].0.request_uri, "/unknown");
    }

    #[tokio::test]
    async fn test_replace_falls_back_on_failure() {
        let plugin = transformer(TransformMode::Replace, ExternalResult::failure());
        let mut response = FakeResponse::json("{\"a\":1}");
        response.headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        plugin.response_filter(&mut response, None).await;

        assert_eq!(response.written.as_deref(), Some(&b"{\"a\":1}"[..]));
        assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert!(!response.headers.contains_key(CONTENT_LENGTH));
        assert_eq!(response.headers.get("x-checked").unwrap(), "failed");
    }

    #[tokio::test]
    async fn test_replace_falls_back_on_empty_success() {
        let plugin = transformer(TransformMode::Replace, success("", "application/json"));
        let mut response = FakeResponse::json("<html><body>hi</body></html>");

        plugin.response_filter(&mut response, None).await;

        assert_eq!(response.written.as_deref(), Some(&b"<html><body>hi</body></html>"[..]));
        assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "text/html; charset=utf-8");
        assert_eq!(response.headers.get("x-checked").unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_replace_uses_configured_type_when_missing() {
        let plugin = transformer(TransformMode::Replace, success("done", ""));
        let mut response = FakeResponse::json("{}");

        plugin.response_filter(&mut response, None).await;
        assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(response.written.as_deref(), Some(&b"done"[..]));
    }

    #[tokio::test]
    async fn test_replace_read_failure_aborts() {
        let plugin = transformer(TransformMode::Replace, success("x", "text/plain"));
        let mut response = FakeResponse::json("{}");
        response.body = None;

        plugin.response_filter(&mut response, None).await;

        assert!(response.written.is_none());
        assert!(response.headers.get("x-checked").is_none());
        assert!(response.headers.contains_key(CONTENT_LENGTH));
        assert!(plugin.notifier.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_token_correlation() {
        let plugin = transformer(TransformMode::Notify, success("", "application/json"))
            .with_token_header("x-request-id");

        for (token, uri) in [("a", "/first"), ("b", "/second")] {
            let request = Request::builder()
                .uri(uri)
                .header("x-request-id", token)
                .body(Body::empty())
                .unwrap();
            plugin.request_filter(&request);
        }

        let mut response = FakeResponse::json("{}");
        plugin.response_filter(&mut response, Some("a")).await;

        let calls = plugin.notifier.calls.lock().unwrap();
        assert_eq!(calls[0].0.request_uri, "/first");
    }
}
