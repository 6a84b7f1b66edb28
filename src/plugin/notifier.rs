//! External endpoint call.
//!
//! # Responsibilities
//! - Serialize the payload and send it with the configured method and content type
//! - Replay captured request headers onto the outbound call
//! - Bound connect, send and body read by one explicit deadline
//!
//! # Design Decisions
//! - Single attempt, no retries
//! - Build, transport, timeout and body-read failures all map to `ExternalResult::failure()`
//! - Idle connections are not pooled, so nothing outlives the call

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method};
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::config::schema::PluginConfig;
use crate::observability::metrics;
use crate::plugin::payload::{ExternalPayload, ExternalResult, DEFAULT_EXTERNAL_CONTENT_TYPE};

/// User-Agent sent on every external call.
pub const NOTIFIER_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Performs the external call for one response.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        config: &PluginConfig,
        payload: &ExternalPayload,
        forward_headers: &HashMap<String, String>,
        deadline: Duration,
    ) -> impl Future<Output = ExternalResult> + Send;
}

#[derive(Debug, thiserror::Error)]
enum NotifyError {
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid method {0:?}")]
    InvalidMethod(String),
    #[error("invalid header {0:?}")]
    InvalidHeader(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// `Notifier` backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
}

impl HttpNotifier {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().pool_max_idle_per_host(0).build()?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        config: &PluginConfig,
        payload: &ExternalPayload,
        forward_headers: &HashMap<String, String>,
        deadline: Duration,
    ) -> Result<ExternalResult, NotifyError> {
        let body = serde_json::to_vec(payload)?;
        let method = Method::from_bytes(config.method.as_bytes())
            .map_err(|_| NotifyError::InvalidMethod(config.method.clone()))?;
        let headers = outbound_headers(config, forward_headers)?;

        tracing::debug!(
            method = %method,
            url = %config.external_api_url,
            forwarded = forward_headers.len(),
            "Calling external endpoint"
        );

        let response = self
            .client
            .request(method, &config.external_api_url)
            .headers(headers)
            .timeout(deadline)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_EXTERNAL_CONTENT_TYPE)
            .to_string();
        let body = response.bytes().await?;

        Ok(ExternalResult {
            success: status.is_success(),
            body,
            content_type,
        })
    }
}

impl Notifier for HttpNotifier {
    async fn notify(
        &self,
        config: &PluginConfig,
        payload: &ExternalPayload,
        forward_headers: &HashMap<String, String>,
        deadline: Duration,
    ) -> ExternalResult {
        let start = Instant::now();
        let outcome = tokio::time::timeout(deadline, self.send(config, payload, forward_headers, deadline)).await;

        let (result, label) = match outcome {
            Ok(Ok(result)) => {
                let label = if result.success { "success" } else { "failure" };
                tracing::info!(
                    success = result.success,
                    content_type = %result.content_type,
                    bytes = result.body.len(),
                    "External call completed"
                );
                (result, label)
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, url = %config.external_api_url, "External call failed");
                (ExternalResult::failure(), "failure")
            }
            Err(_) => {
                tracing::error!(
                    timeout_ms = deadline.as_millis() as u64,
                    url = %config.external_api_url,
                    "External call timed out"
                );
                (ExternalResult::failure(), "timeout")
            }
        };

        metrics::record_external_call(label, start);
        result
    }
}

/// Content type and user agent first, then forwarded headers, which overwrite
/// any header of the same name.
fn outbound_headers(
    config: &PluginConfig,
    forward_headers: &HashMap<String, String>,
) -> Result<HeaderMap, NotifyError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&config.content_type)
            .map_err(|_| NotifyError::InvalidHeader(CONTENT_TYPE.to_string()))?,
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(NOTIFIER_USER_AGENT));

    for (name, value) in forward_headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| NotifyError::InvalidHeader(name.clone()))?;
        let header_value = HeaderValue::from_str(value).map_err(|_| NotifyError::InvalidHeader(name.clone()))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}
