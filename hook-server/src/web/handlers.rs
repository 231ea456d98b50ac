//! Public endpoint handlers.
//!
//! The ingestion handler only validates the id, hands the call to the
//! pipeline and acknowledges. It never reports storage or forward failures
//! to the sender.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::ApiError;
use crate::pipeline::{Ack, Forwarder, Ingestor};
use crate::store::Store;
use crate::util::is_valid_id;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub ingestor: Ingestor,
}

impl AppState {
    /// Build state with a forwarder using the configured timeout.
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        let forwarder = Forwarder::new(config.forward_timeout());
        Self::with_forwarder(config, store, forwarder)
    }

    pub fn with_forwarder(config: Config, store: Arc<dyn Store>, forwarder: Forwarder) -> Self {
        Self {
            config: Arc::new(config),
            ingestor: Ingestor::new(Arc::clone(&store), forwarder),
            store,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn root() -> &'static str {
    "webhook server is running"
}

// =============================================================================
// Ingestion
// =============================================================================

/// Public ingestion endpoint; accepts every method.
///
/// The pipeline runs on its own task so a sender hanging up mid-request does
/// not cancel the capture or the forward hand-off.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Ack>, ApiError> {
    if !is_valid_id(&id) {
        warn!(webhook_id = %id, "webhook_id_malformed");
        return Err(ApiError::BadRequest("Invalid webhook ID".to_string()));
    }

    let ingestor = state.ingestor.clone();
    let task = tokio::spawn(async move { ingestor.ingest(&id, method, headers, body).await });

    let ack = task.await.unwrap_or_else(|e| {
        error!(error = %e, "webhook_ingest_task_failed");
        Ack::RECEIVED
    });

    Ok(Json(ack))
}
