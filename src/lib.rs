//! Gateway plugin that reports upstream responses to an external endpoint
//! and, in replace mode, serves the endpoint's answer instead.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod plugin;
pub mod routing;

pub use config::schema::{GatewayConfig, PluginConfig};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use plugin::ResponseTransformer;
