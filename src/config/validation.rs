//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the external URL, method and timeout of each plugin
//! - Check header names and rule values are valid on the wire
//! - Detect duplicate route names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs after normalization, before a config is activated

use axum::http::{HeaderName, HeaderValue, Method};
use std::collections::HashSet;
use url::Url;

use crate::config::schema::{GatewayConfig, PluginConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("external_api_url {0:?} is not a valid http(s) URL")]
    InvalidUrl(String),
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("method {0:?} is not a valid HTTP method")]
    InvalidMethod(String),
    #[error("header name {0:?} is not valid")]
    InvalidHeaderName(String),
    #[error("value for header {0:?} is not a valid header value")]
    InvalidHeaderValue(String),
    #[error("content_type {0:?} is not a valid header value")]
    InvalidContentType(String),
    #[error("route name {0:?} is used more than once")]
    DuplicateRoute(String),
    #[error("route {0:?} path_prefix must start with '/'")]
    InvalidPathPrefix(String),
    #[error("correlation capacity must be greater than zero")]
    ZeroCapacity,
}

/// Validate one plugin configuration.
pub fn validate_plugin_config(config: &PluginConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_plugin(config, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the host configuration and every route's plugin.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.correlation.capacity == 0 {
        errors.push(ValidationError::ZeroCapacity);
    }

    let mut names = HashSet::new();
    for route in &config.routes {
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPathPrefix(route.name.clone()));
        }
        check_plugin(&route.plugin, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_plugin(config: &PluginConfig, errors: &mut Vec<ValidationError>) {
    match Url::parse(&config.external_api_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::InvalidUrl(config.external_api_url.clone())),
    }

    if config.timeout == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if Method::from_bytes(config.method.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidMethod(config.method.clone()));
    }

    if HeaderValue::from_str(&config.content_type).is_err() {
        errors.push(ValidationError::InvalidContentType(config.content_type.clone()));
    }

    for name in &config.forward_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName(name.clone()));
        }
    }

    for rule in &config.response_headers {
        if HeaderName::from_bytes(rule.name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName(rule.name.clone()));
            continue;
        }
        if HeaderValue::from_str(&rule.success_value).is_err()
            || HeaderValue::from_str(&rule.failure_value).is_err()
        {
            errors.push(ValidationError::InvalidHeaderValue(rule.name.clone()));
        }
    }
}
