//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use vens_core::config::VensConfig;
use vens_core::error::VensError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let notifier_routes = Router::new()
        .route("/notifier/action", post(handlers::notifier_action))
        .route("/notifier/fired", post(handlers::notifier_fired))
        .route("/notifier/payload", post(handlers::notifier_payload))
        .route("/notifier/enrich", post(handlers::notifier_enrich));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/channel/{method}", post(handlers::invoke_method))
        .route("/reminders", get(handlers::list_reminders))
        .route(
            "/reminders/{id}",
            get(handlers::get_reminder).delete(handlers::acknowledge_reminder),
        )
        .route("/events", get(handlers::events))
        .merge(notifier_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Binds to 127.0.0.1 (localhost only) on `api.port`.
pub async fn start_server(config: &VensConfig, state: AppState) -> Result<(), VensError> {
    let addr = format!("127.0.0.1:{}", config.api.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| VensError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| VensError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
