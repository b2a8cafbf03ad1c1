use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session control
        .route("/session/start", post(handlers::start_session))
        .route("/session/stop", post(handlers::stop_session))
        .route("/session/toggle", post(handlers::toggle_session))
        .route("/session/text", post(handlers::send_text))
        // Session queries
        .route("/session/status", get(handlers::session_status))
        .route("/session/transcript", get(handlers::session_transcript))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
