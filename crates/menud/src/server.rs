//! HTTP server for menud.

use anyhow::Result;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::MenudConfig;
use crate::governor::RequestGovernor;
use crate::matcher::CorpusMatcher;
use crate::resolver::ExplanationResolver;
use crate::routes;
use crate::store::CorpusStore;

/// Application state shared across handlers.
pub struct AppState {
    pub resolver: ExplanationResolver,
    pub governor: RequestGovernor,
    pub store: Arc<dyn CorpusStore>,
    /// Cheap overlap matcher for the interactive lookup route.
    pub search_matcher: CorpusMatcher,
    /// Static bearer-token -> user-id table.
    pub auth_tokens: HashMap<String, String>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        resolver: ExplanationResolver,
        governor: RequestGovernor,
        store: Arc<dyn CorpusStore>,
        search_matcher: CorpusMatcher,
        auth_tokens: HashMap<String, String>,
    ) -> Self {
        Self {
            resolver,
            governor,
            store,
            search_matcher,
            auth_tokens,
            start_time: Instant::now(),
        }
    }
}

/// Build the router with its middleware stack.
pub fn router(state: Arc<AppState>, config: &MenudConfig) -> Router {
    Router::new()
        .merge(routes::explain_routes())
        .merge(routes::search_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        // Browser preflight only; the governor enforces the allow-list.
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

/// Run the HTTP server until shutdown.
pub async fn run(state: AppState, config: &MenudConfig) -> Result<()> {
    let app = router(Arc::new(state), config);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    info!("Listening on http://{}", config.server.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
