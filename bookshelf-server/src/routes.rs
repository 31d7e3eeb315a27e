//! HTTP routes

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the application router
///
/// `/sw/*` exposes the cache lifecycle; every other path is answered by the
/// cache.
pub fn create_router(state: AppState) -> Router {
    // BOOKSHELF_CORS_ORIGINS can be comma-separated list of origins, or "*" for any
    let cors = match std::env::var("BOOKSHELF_CORS_ORIGINS").ok() {
        Some(origins) if origins == "*" => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        Some(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => {
            // Default: allow localhost origins for development
            CorsLayer::new()
                .allow_origin(AllowOrigin::list([
                    "http://localhost:3000".parse().unwrap(),
                    "http://localhost:8080".parse().unwrap(),
                    "http://127.0.0.1:3000".parse().unwrap(),
                    "http://127.0.0.1:8080".parse().unwrap(),
                ]))
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    let sw_routes = Router::new()
        .route("/status", get(handlers::cache_status))
        .route("/message", post(handlers::post_message))
        .route("/events", get(handlers::cache_events));

    Router::new()
        .nest("/sw", sw_routes)
        .route("/health", get(handlers::health_check))
        .fallback(handlers::serve_asset)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
