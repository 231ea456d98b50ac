//! Webhook ingestion pipeline.
//!
//! ```text
//! inbound call → save captured request → look up forward target → spawn forward → ack
//! ```
//!
//! The acknowledgement never depends on storage or the forward target:
//! failures in either are logged and the sender still gets its 200.

pub mod forwarder;
pub mod headers;

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::store::{NewCapturedRequest, Store};

pub use forwarder::{ForwardJob, ForwardOutcome, Forwarder};
pub use headers::{forwardable_headers, to_multimap};

/// Fixed acknowledgement returned to webhook senders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub status: &'static str,
}

impl Ack {
    pub const RECEIVED: Ack = Ack {
        status: "Webhook received",
    };
}

/// Records inbound calls and hands them to the forwarder.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn Store>,
    forwarder: Forwarder,
}

impl Ingestor {
    pub fn new(store: Arc<dyn Store>, forwarder: Forwarder) -> Self {
        Self { store, forwarder }
    }

    /// Capture one inbound call and forward it if the webhook has a target.
    ///
    /// Returns once the request is stored (or storing failed) and any forward
    /// has been spawned; it never waits for the forward itself.
    pub async fn ingest(
        &self,
        webhook_id: &str,
        method: Method,
        headers: HeaderMap,
        body: Bytes,
    ) -> Ack {
        info!(
            webhook_id = %webhook_id,
            method = %method,
            header_count = headers.len(),
            body_length = body.len(),
            "webhook_received"
        );

        let captured = NewCapturedRequest {
            webhook_id: webhook_id.to_string(),
            method: method.to_string(),
            headers: to_multimap(&headers),
            body: body.to_vec(),
            received_at: Utc::now(),
        };

        match self.store.save_captured_request(&captured).await {
            Ok(()) => debug!(webhook_id = %webhook_id, "webhook_request_saved"),
            Err(e) => error!(webhook_id = %webhook_id, error = %e, "webhook_request_save_failed"),
        }

        match self.store.get_forward_url(webhook_id).await {
            Ok(Some(target)) => {
                self.forwarder.spawn(ForwardJob {
                    webhook_id: webhook_id.to_string(),
                    target,
                    method,
                    headers,
                    body,
                });
            }
            Ok(None) => debug!(webhook_id = %webhook_id, "webhook_forward_not_configured"),
            Err(e) => {
                warn!(webhook_id = %webhook_id, error = %e, "webhook_forward_lookup_failed");
            }
        }

        Ack::RECEIVED
    }
}
