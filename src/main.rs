//! Upstream response transformer gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http server ──▶ route table ──▶ request hook (capture) ──▶ Upstream
//!                                                                              │
//!     Client ◀── response ◀── response hook (external call, headers, body) ◀───┘
//!                                    │
//!                                    ▼
//!                            External endpoint
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use upstream_response_transformer::config::{load_config, watcher::ConfigWatcher};
use upstream_response_transformer::observability::{logging, metrics};
use upstream_response_transformer::{GatewayServer, Shutdown};

#[derive(Parser)]
#[command(name = "upstream-response-transformer")]
#[command(about = "Gateway that reports upstream responses to an external endpoint", long_about = None)]
struct Cli {
    /// Host configuration file (TOML).
    #[arg(short, long, env = "URT_CONFIG", default_value = "gateway.toml")]
    config: PathBuf,

    /// Reload routes when the configuration file changes.
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    // Keep the watcher handle alive for the lifetime of the server.
    let (_watcher, config_updates) = if cli.watch {
        let (watcher, updates) = ConfigWatcher::new(&cli.config);
        (Some(watcher.run()?), updates)
    } else {
        let (_, updates) = mpsc::unbounded_channel();
        (None, updates)
    };

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signals();

    let server = GatewayServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
