//! Gateway host server.
//!
//! # Responsibilities
//! - Create the Axum Router with the catch-all gateway handler
//! - Wire up middleware (tracing, request ID)
//! - Run each matched route's request hook before forwarding upstream
//! - Run the response hook on the upstream response before it reaches the client
//! - Swap the route table when a reloaded configuration arrives

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, InvalidUriParts, PathAndQuery, Scheme},
        Request, StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::http::response::UpstreamResponse;
use crate::observability::metrics;
use crate::plugin::{CorrelationStore, HttpNotifier};
use crate::routing::RouteTable;

/// Error starting the gateway.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to build external client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("invalid upstream address {0:?}")]
    InvalidUpstream(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    routes: Arc<ArcSwap<RouteTable>>,
    client: Client<HttpConnector, Body>,
    upstream: Authority,
    upstream_timeout: Duration,
    body_limit: usize,
}

/// Gateway hosting the response transformer in front of one upstream.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    routes: Arc<ArcSwap<RouteTable>>,
    store: Arc<CorrelationStore>,
    notifier: Arc<HttpNotifier>,
}

impl GatewayServer {
    /// Activate routes and build the router.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let upstream = Authority::from_str(&config.upstream.address)
            .map_err(|_| ServerError::InvalidUpstream(config.upstream.address.clone()))?;

        let store = Arc::new(CorrelationStore::new(&config.correlation));
        let notifier = Arc::new(HttpNotifier::new()?);
        let table = RouteTable::activate(&config.routes, &store, &notifier, &config.correlation.token_header);
        let routes = Arc::new(ArcSwap::from_pointee(table));

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            routes: routes.clone(),
            client,
            upstream,
            upstream_timeout: Duration::from_secs(config.upstream.request_timeout_secs),
            body_limit: config.upstream.body_limit_bytes,
        };

        let router = Self::build_router(state);
        Ok(Self {
            router,
            config,
            routes,
            store,
            notifier,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// Run until a shutdown signal, applying configuration reloads as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            routes = self.routes.load().len(),
            "Gateway starting"
        );

        let routes = self.routes.clone();
        let store = self.store.clone();
        let notifier = self.notifier.clone();
        let token_header = self.config.correlation.token_header.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => {
                        let Some(config) = update else { break };
                        let table = RouteTable::activate(&config.routes, &store, &notifier, &token_header);
                        tracing::info!(routes = table.len(), "Route table reloaded");
                        routes.store(Arc::new(table));
                    }
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Gateway draining connections");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The correlation store shared by every route.
    pub fn store(&self) -> Arc<CorrelationStore> {
        self.store.clone()
    }
}

/// Forward a request upstream, running the matched route's plugin around it.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let token = request.request_id().map(str::to_string);

    let table = state.routes.load_full();
    let route = table.match_path(request.uri().path());
    let route_name = route.map_or("none", |r| r.name.as_str()).to_string();
    let plugin = route.map(|r| r.plugin.clone());

    let captured = plugin.as_ref().map(|p| p.request_filter(&request));

    tracing::debug!(
        request_id = token.as_deref().unwrap_or("unknown"),
        route = %route_name,
        path = %request.uri().path(),
        "Forwarding request"
    );

    let upstream_request = match upstream_request(request, &state.upstream) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build upstream URI");
            abandon(plugin.as_deref(), captured);
            metrics::record_request(&method, 400, &route_name, start_time);
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };

    let upstream_call = state.client.request(upstream_request);
    let response: Response<Incoming> = match tokio::time::timeout(state.upstream_timeout, upstream_call).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::error!(route = %route_name, error = %e, "Upstream error");
            abandon(plugin.as_deref(), captured);
            metrics::record_request(&method, 502, &route_name, start_time);
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
        Err(_) => {
            tracing::error!(route = %route_name, "Upstream timed out");
            abandon(plugin.as_deref(), captured);
            metrics::record_request(&method, 504, &route_name, start_time);
            return (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out").into_response();
        }
    };

    let mut upstream = UpstreamResponse::new(response.map(Body::new), state.body_limit);
    if let Some(plugin) = &plugin {
        plugin.response_filter(&mut upstream, token.as_deref()).await;
    }

    let response = upstream.into_response();
    metrics::record_request(&method, response.status().as_u16(), &route_name, start_time);
    response
}

fn abandon(plugin: Option<&crate::plugin::ResponseTransformer>, captured: Option<u64>) {
    if let (Some(plugin), Some(id)) = (plugin, captured) {
        plugin.abandon(id);
    }
}

/// Point the request at the upstream, keeping path and query.
fn upstream_request(request: Request<Body>, upstream: &Authority) -> Result<Request<Body>, InvalidUriParts> {
    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = Uri::from_parts(uri_parts)?;
    parts.version = Version::HTTP_11;

    Ok(Request::from_parts(parts, body))
}
