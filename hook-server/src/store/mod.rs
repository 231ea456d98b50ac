//! Persistence for webhooks, captured requests and users.
//!
//! The [`Store`] trait is the seam between the HTTP layer and the database.
//! [`PgStore`] is the production implementation; nothing is cached in
//! process, the database is the single source of truth.

pub mod postgres;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

pub use postgres::PgStore;

/// Header name to every value received under that name, in arrival order.
pub type HeaderMultimap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("webhook {0} does not exist")]
    UnknownWebhook(String),
}

/// A configured webhook endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Webhook {
    pub id: String,
    /// Owner; the only basis for access control.
    pub user_id: String,
    /// Empty when forwarding is disabled.
    pub forward_url: String,
    pub name: String,
    pub source_type: String,
    pub created_at: DateTime<Utc>,
}

impl Webhook {
    /// The forward destination, if one is configured.
    pub fn forward_target(&self) -> Option<&str> {
        Some(self.forward_url.as_str()).filter(|u| !u.is_empty())
    }
}

/// Values for `create_or_update_webhook`.
#[derive(Debug, Clone)]
pub struct NewWebhook {
    pub id: String,
    pub user_id: String,
    pub forward_url: String,
    pub name: String,
    pub source_type: String,
}

/// Partial update of a webhook. `None` leaves the column untouched and an
/// empty `forward_url` disables forwarding.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub forward_url: Option<String>,
}

impl WebhookUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.forward_url.is_none()
    }
}

/// An inbound call about to be recorded.
#[derive(Debug, Clone)]
pub struct NewCapturedRequest {
    pub webhook_id: String,
    pub method: String,
    pub headers: HeaderMultimap,
    pub body: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

/// A recorded inbound call. Never mutated after capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapturedRequest {
    pub request_id: i64,
    pub webhook_id: String,
    pub method: String,
    pub headers: HeaderMultimap,
    #[serde(serialize_with = "serialize_body")]
    pub body: Vec<u8>,
    #[serde(rename = "timestamp")]
    pub received_at: DateTime<Utc>,
}

// Bodies are opaque bytes; the inspection view renders them as text.
fn serialize_body<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(body))
}

/// Storage operations consumed by the ingestion pipeline and the management API.
///
/// Implementations must be safe for concurrent use from many requests.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a webhook, or update name/source type/forward URL when the id
    /// already exists for the same owner. Returns the number of rows written;
    /// `0` means the id belongs to a different owner and nothing changed.
    async fn create_or_update_webhook(&self, webhook: &NewWebhook) -> Result<u64, StoreError>;

    /// Forward destination for a webhook. Unknown ids and empty URLs yield `None`.
    async fn get_forward_url(&self, webhook_id: &str) -> Result<Option<String>, StoreError>;

    async fn save_captured_request(&self, request: &NewCapturedRequest) -> Result<(), StoreError>;

    /// Captured requests for a webhook, newest first.
    async fn list_captured_requests(
        &self,
        webhook_id: &str,
        limit: i64,
    ) -> Result<Vec<CapturedRequest>, StoreError>;

    /// Delete every captured request of a webhook. Callers check ownership first.
    async fn clear_captured_requests(&self, webhook_id: &str) -> Result<u64, StoreError>;

    async fn check_ownership(&self, webhook_id: &str, owner_id: &str) -> Result<bool, StoreError>;

    async fn get_webhook(
        &self,
        webhook_id: &str,
        owner_id: &str,
    ) -> Result<Option<Webhook>, StoreError>;

    /// Webhooks owned by `owner_id`, newest first.
    async fn list_webhooks_for_owner(&self, owner_id: &str) -> Result<Vec<Webhook>, StoreError>;

    async fn update_webhook(
        &self,
        webhook_id: &str,
        owner_id: &str,
        update: &WebhookUpdate,
    ) -> Result<u64, StoreError>;

    /// Delete a webhook and, by cascade, its captured requests.
    async fn delete_webhook(&self, webhook_id: &str, owner_id: &str) -> Result<u64, StoreError>;

    /// Create or refresh a user. A new id arriving with an email that is
    /// already registered takes over that user row. An existing id never
    /// takes an email held by another user; its row is left as is.
    async fn upsert_user(&self, id: &str, email: Option<&str>) -> Result<(), StoreError>;
}
