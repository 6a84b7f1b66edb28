//! Configuration loading.
//!
//! `parse_plugin_config` is the plugin's ParseConf: raw JSON in, a normalized
//! and validated `PluginConfig` out. `load_config` reads the host TOML file and
//! runs every embedded plugin config through the same normalization.

use std::fs;
use std::path::Path;

use crate::config::schema::{GatewayConfig, PluginConfig};
use crate::config::validation::{validate_config, validate_plugin_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Plugin config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse one plugin configuration from its JSON form.
pub fn parse_plugin_config(raw: &[u8]) -> Result<PluginConfig, ConfigError> {
    let mut config: PluginConfig = serde_json::from_slice(raw).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse plugin configuration");
        e
    })?;
    config.normalize();
    validate_plugin_config(&config).map_err(ConfigError::Validation)?;

    tracing::info!(
        mode = ?config.mode,
        external_api_url = %config.external_api_url,
        rules = config.response_headers.len(),
        "Plugin configuration parsed"
    );
    Ok(config)
}

/// Parse host configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let mut config: GatewayConfig = toml::from_str(content)?;
    for route in &mut config.routes {
        route.plugin.normalize();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate host configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}
