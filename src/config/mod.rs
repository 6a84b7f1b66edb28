//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! host file (TOML)                 plugin JSON (ParseConf)
//!     → loader.rs (deserialize)        → loader.rs (deserialize)
//!     → PluginConfig::normalize (defaults, exactly once)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig / PluginConfig (immutable)
//!     → shared via Arc with both plugin hooks
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads and validates
//!     → server swaps its route table
//! ```
//!
//! # Design Decisions
//! - Config is immutable once activated; changes require a reload
//! - Host sections default so a file can hold only routes
//! - Unknown plugin modes are parse errors rather than silent pass-through

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_plugin_config, ConfigError};
pub use schema::{
    CorrelationConfig, GatewayConfig, HeaderRule, HeaderRuleMode, ListenerConfig, ObservabilityConfig,
    PluginConfig, RouteConfig, TransformMode, UpstreamConfig,
};
