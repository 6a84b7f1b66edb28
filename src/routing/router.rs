//! Route table: path prefix → activated plugin instance.

use std::sync::Arc;

use crate::config::schema::RouteConfig;
use crate::plugin::{CorrelationStore, HttpNotifier, ResponseTransformer};
use crate::routing::matcher::PathPrefixMatcher;

/// A route with its activated plugin.
#[derive(Debug)]
pub struct ActiveRoute {
    pub name: String,
    matcher: PathPrefixMatcher,
    pub plugin: Arc<ResponseTransformer<HttpNotifier>>,
}

/// Immutable set of active routes, most specific prefix first.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<ActiveRoute>,
}

impl RouteTable {
    /// Activate every route: each plugin config is wrapped once and shared with both hooks.
    pub fn activate(
        routes: &[RouteConfig],
        store: &Arc<CorrelationStore>,
        notifier: &Arc<HttpNotifier>,
        token_header: &str,
    ) -> Self {
        let mut active: Vec<ActiveRoute> = routes
            .iter()
            .map(|route| ActiveRoute {
                name: route.name.clone(),
                matcher: PathPrefixMatcher::new(route.path_prefix.clone()),
                plugin: Arc::new(
                    ResponseTransformer::new(Arc::new(route.plugin.clone()), store.clone(), notifier.clone())
                        .with_token_header(token_header),
                ),
            })
            .collect();

        // Stable sort keeps configuration order between equal prefixes.
        active.sort_by(|a, b| b.matcher.len().cmp(&a.matcher.len()));

        for route in &active {
            tracing::info!(
                route = %route.name,
                mode = ?route.plugin.config().mode,
                "Route activated"
            );
        }
        Self { routes: active }
    }

    /// Most specific route whose prefix matches `path`.
    pub fn match_path(&self, path: &str) -> Option<&ActiveRoute> {
        self.routes.iter().find(|r| r.matcher.matches(path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
