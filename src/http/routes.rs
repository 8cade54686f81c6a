use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Flow control
        .route("/session/start", post(handlers::start_session))
        .route("/session/advance", post(handlers::advance))
        .route("/session/toggle", post(handlers::toggle_recording))
        .route("/session/response", post(handlers::edit_response))
        // Integrity events from the shell
        .route("/session/window-event", post(handlers::window_event))
        // Session queries
        .route("/session/status", get(handlers::get_status))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // The shell is served from a different origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}
