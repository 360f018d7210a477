use crate::handlers;
use crate::handlers::realestate::NEW_DEALS_PATH;
use crate::middleware::require_non_production;
use crate::state::AppState;
use axum::{Router, middleware, routing::get};
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;

/// Build and configure the application router
pub fn build_router(state: AppState) -> Router {
    let diagnostics = Router::new()
        .route("/api/performance", get(handlers::performance_stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_non_production,
        ));

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Data routes
        .route(NEW_DEALS_PATH, get(handlers::new_deals))
        .merge(diagnostics)
        // Middleware
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
