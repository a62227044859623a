//! civic-api: REST API server for civic issue reporting
//!
//! Provides HTTP endpoints for reporting, browsing, upvoting and
//! administering issues.

pub mod auth;
pub mod error;
pub mod geocode;
pub mod media;
pub mod routes;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Room for the text fields next to the largest accepted image
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Normalize the configured mount point to "" or "/segment"
fn mount_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let mut api = Router::new()
        .route(
            "/issues",
            get(routes::list_issues).post(routes::create_issue),
        )
        .route("/issues/categories", get(routes::categories))
        .route("/issues/{id}", get(routes::get_issue))
        .route("/issues/{id}/upvote", patch(routes::toggle_upvote))
        .route("/issues/{id}/status", patch(routes::update_status));
    if state.geocoder.is_some() {
        api = api.route("/geocode", post(routes::geocode));
    }

    let prefix = mount_prefix(&state.server.api_prefix);
    let mut app = Router::new().route("/health", get(routes::health));
    app = if prefix.is_empty() {
        app.merge(api)
    } else {
        app.nest(&prefix, api)
    };

    if let Some(dir) = state.media.serve_dir() {
        app = app.nest_service("/media", ServeDir::new(dir));
    }

    let cors = if state.server.cors_allow_any {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let body_limit = state.media_config.max_bytes + FORM_OVERHEAD_BYTES;

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
