//! HTTP surface.
//!
//! - `ANY /webhook/:id` is public: capture, forward, acknowledge
//! - `/create`, `/webhooks[/:id]` and `/inspect/:id` require a bearer token
//!   and are scoped to the caller's own webhooks

pub mod extract;
pub mod handlers;
pub mod manage;
pub mod shutdown;

use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use extract::AuthenticatedUser;
pub use handlers::{health, receive_webhook, root, AppState, HealthResponse};
pub use manage::{
    clear_requests, create_webhook, delete_webhook, get_webhook, inspect_webhook, list_webhooks,
    update_webhook, CreateWebhookRequest, CreateWebhookResponse,
};
pub use shutdown::{shutdown_signal, wait_for_stop_signal, StopSignal};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        // Payload size is left to the HTTP server; no extra limit here.
        .route(
            "/webhook/:id",
            any(receive_webhook).layer(DefaultBodyLimit::disable()),
        )
        .route("/create", post(create_webhook))
        .route("/webhooks", get(list_webhooks).post(create_webhook))
        .route(
            "/webhooks/:id",
            get(get_webhook).put(update_webhook).delete(delete_webhook),
        )
        .route(
            "/inspect/:id",
            get(inspect_webhook).delete(clear_requests),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
