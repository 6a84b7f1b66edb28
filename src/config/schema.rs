//! Configuration schema definitions.
//!
//! `GatewayConfig` is the host file (TOML). Each route embeds a `PluginConfig`,
//! which can also be parsed on its own from the JSON the plugin contract uses.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_METHOD: &str = "POST";
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Root configuration for the gateway host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream the gateway forwards to.
    pub upstream: UpstreamConfig,

    /// Request/response correlation settings.
    pub correlation: CorrelationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Routes with their plugin configuration.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9080".to_string(),
        }
    }
}

/// Upstream server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Total time allowed for the upstream exchange in seconds.
    pub request_timeout_secs: u64,

    /// Largest upstream body the plugin will buffer in replace mode.
    pub body_limit_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            request_timeout_secs: 30,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Correlation store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Age after which a pending request can no longer be claimed.
    pub freshness_ms: u64,

    /// Maximum number of pending requests held at once.
    pub capacity: usize,

    /// Request header carrying a per-exchange token. Empty disables token matching.
    pub token_header: String,

    /// Treat more than one fresh candidate as a miss instead of guessing.
    pub reject_ambiguous: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            freshness_ms: 5_000,
            capacity: 4_096,
            token_header: "x-request-id".to_string(),
            reject_ambiguous: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Route configuration binding a path prefix to a plugin instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// Plugin configuration for this route.
    pub plugin: PluginConfig,
}

fn default_path_prefix() -> String {
    "/".to_string()
}

/// How the plugin treats the upstream response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformMode {
    /// Report the exchange; the response body is never read or changed.
    #[default]
    Notify,
    /// Send the body to the endpoint and serve its answer when it succeeds.
    Replace,
}

/// When a header rule writes its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderRuleMode {
    Replace,
    Notify,
    Empty,
}

/// A header set on the outgoing response depending on the external outcome.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeaderRule {
    pub name: String,
    pub mode: HeaderRuleMode,
    #[serde(default)]
    pub success_value: String,
    #[serde(default)]
    pub failure_value: String,
}

/// Per-route plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PluginConfig {
    /// Destination of the external call.
    pub external_api_url: String,

    /// Deadline for the whole external call in milliseconds.
    #[serde(default = "default_timeout_ms", deserialize_with = "null_as_default")]
    pub timeout: u64,

    /// Request headers captured and replayed to the external call.
    #[serde(default, deserialize_with = "null_as_default")]
    pub forward_headers: Vec<String>,

    /// HTTP method of the external call, sent with the case given.
    #[serde(default = "default_method", deserialize_with = "null_as_default")]
    pub method: String,

    #[serde(default, deserialize_with = "deserialize_mode")]
    pub mode: TransformMode,

    /// Content type of the external call, and fallback for replaced bodies.
    #[serde(default = "default_content_type", deserialize_with = "null_as_default")]
    pub content_type: String,

    /// Header rules applied after the external call.
    #[serde(default, deserialize_with = "null_as_default")]
    pub response_headers: Vec<HeaderRule>,
}

/// `null` reads as the zero value; `normalize` then applies the real default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `null` and `""` select the default mode; anything else must name a mode.
fn deserialize_mode<'de, D>(deserializer: D) -> Result<TransformMode, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)?.as_deref().map(str::trim) {
        None | Some("") => Ok(TransformMode::default()),
        Some("notify") => Ok(TransformMode::Notify),
        Some("replace") => Ok(TransformMode::Replace),
        Some(other) => Err(serde::de::Error::unknown_variant(other, &["notify", "replace"])),
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

impl PluginConfig {
    /// Fill zero/empty values with defaults and canonicalize names.
    ///
    /// Idempotent: normalizing a normalized config changes nothing.
    pub fn normalize(&mut self) {
        if self.timeout == 0 {
            self.timeout = DEFAULT_TIMEOUT_MS;
        }

        let method = self.method.trim();
        self.method = if method.is_empty() {
            DEFAULT_METHOD.to_string()
        } else {
            method.to_string()
        };

        if self.content_type.trim().is_empty() {
            self.content_type = DEFAULT_CONTENT_TYPE.to_string();
        }

        let mut seen: Vec<String> = Vec::with_capacity(self.forward_headers.len());
        self.forward_headers.retain(|name| {
            let lower = name.trim().to_ascii_lowercase();
            if lower.is_empty() || seen.contains(&lower) {
                false
            } else {
                seen.push(lower);
                true
            }
        });
        for name in &mut self.forward_headers {
            *name = name.trim().to_string();
        }
    }

    /// Deadline for the external call.
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}
