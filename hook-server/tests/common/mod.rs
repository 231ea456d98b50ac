//! Shared helpers for hookcatch integration tests.
//!
//! Provides an in-memory `Store`, a store whose every call fails, and
//! helpers to drive the router without a database or network listener.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

use hookcatch::auth::issue_token;
use hookcatch::store::{
    CapturedRequest, NewCapturedRequest, NewWebhook, Store, StoreError, Webhook, WebhookUpdate,
};
use hookcatch::{router, AppState, Config, Forwarder};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const USER_A: &str = "user-a";
pub const USER_B: &str = "user-b";

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredUser {
    id: String,
    email: Option<String>,
}

#[derive(Default)]
struct Tables {
    users: Vec<StoredUser>,
    // Insertion order stands in for created_at ordering.
    webhooks: Vec<Webhook>,
    requests: Vec<CapturedRequest>,
    next_request_id: i64,
}

/// In-memory `Store` with the same observable behavior as `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save_captured_request` calls, successful or not.
    pub fn save_calls(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn user_ids(&self) -> Vec<String> {
        let tables = self.tables.lock().unwrap();
        tables.users.iter().map(|u| u.id.clone()).collect()
    }

    pub fn user_email(&self, id: &str) -> Option<String> {
        let tables = self.tables.lock().unwrap();
        tables
            .users
            .iter()
            .find(|u| u.id == id)
            .and_then(|u| u.email.clone())
    }

    pub fn webhook_exists(&self, id: &str) -> bool {
        let tables = self.tables.lock().unwrap();
        tables.webhooks.iter().any(|w| w.id == id)
    }

    /// Insert a webhook directly, creating the owner if needed.
    pub fn seed_webhook(&self, id: &str, owner: &str, forward_url: &str) {
        let mut tables = self.tables.lock().unwrap();
        if !tables.users.iter().any(|u| u.id == owner) {
            tables.users.push(StoredUser {
                id: owner.to_string(),
                email: None,
            });
        }
        tables.webhooks.push(Webhook {
            id: id.to_string(),
            user_id: owner.to_string(),
            forward_url: forward_url.to_string(),
            name: format!("{id} name"),
            source_type: "test".to_string(),
            created_at: Utc::now(),
        });
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_or_update_webhook(&self, webhook: &NewWebhook) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(existing) = tables.webhooks.iter_mut().find(|w| w.id == webhook.id) {
            if existing.user_id != webhook.user_id {
                return Ok(0);
            }
            existing.forward_url = webhook.forward_url.clone();
            existing.name = webhook.name.clone();
            existing.source_type = webhook.source_type.clone();
            return Ok(1);
        }

        if !tables.users.iter().any(|u| u.id == webhook.user_id) {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }

        tables.webhooks.push(Webhook {
            id: webhook.id.clone(),
            user_id: webhook.user_id.clone(),
            forward_url: webhook.forward_url.clone(),
            name: webhook.name.clone(),
            source_type: webhook.source_type.clone(),
            created_at: Utc::now(),
        });
        Ok(1)
    }

    async fn get_forward_url(&self, webhook_id: &str) -> Result<Option<String>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .webhooks
            .iter()
            .find(|w| w.id == webhook_id)
            .and_then(|w| w.forward_target().map(str::to_string)))
    }

    async fn save_captured_request(&self, request: &NewCapturedRequest) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        if !tables.webhooks.iter().any(|w| w.id == request.webhook_id) {
            return Err(StoreError::UnknownWebhook(request.webhook_id.clone()));
        }

        tables.next_request_id += 1;
        let request_id = tables.next_request_id;
        tables.requests.push(CapturedRequest {
            request_id,
            webhook_id: request.webhook_id.clone(),
            method: request.method.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            received_at: request.received_at,
        });
        Ok(())
    }

    async fn list_captured_requests(
        &self,
        webhook_id: &str,
        limit: i64,
    ) -> Result<Vec<CapturedRequest>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let mut requests: Vec<_> = tables
            .requests
            .iter()
            .filter(|r| r.webhook_id == webhook_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| {
            (b.received_at, b.request_id).cmp(&(a.received_at, a.request_id))
        });
        requests.truncate(limit.max(0) as usize);
        Ok(requests)
    }

    async fn clear_captured_requests(&self, webhook_id: &str) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.requests.len();
        tables.requests.retain(|r| r.webhook_id != webhook_id);
        Ok((before - tables.requests.len()) as u64)
    }

    async fn check_ownership(&self, webhook_id: &str, owner_id: &str) -> Result<bool, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .webhooks
            .iter()
            .any(|w| w.id == webhook_id && w.user_id == owner_id))
    }

    async fn get_webhook(
        &self,
        webhook_id: &str,
        owner_id: &str,
    ) -> Result<Option<Webhook>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .webhooks
            .iter()
            .find(|w| w.id == webhook_id && w.user_id == owner_id)
            .cloned())
    }

    async fn list_webhooks_for_owner(&self, owner_id: &str) -> Result<Vec<Webhook>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .webhooks
            .iter()
            .rev()
            .filter(|w| w.user_id == owner_id)
            .cloned()
            .collect())
    }

    async fn update_webhook(
        &self,
        webhook_id: &str,
        owner_id: &str,
        update: &WebhookUpdate,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        match tables
            .webhooks
            .iter_mut()
            .find(|w| w.id == webhook_id && w.user_id == owner_id)
        {
            Some(webhook) => {
                if let Some(name) = &update.name {
                    webhook.name = name.clone();
                }
                if let Some(forward_url) = &update.forward_url {
                    webhook.forward_url = forward_url.clone();
                }
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_webhook(&self, webhook_id: &str, owner_id: &str) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.webhooks.len();
        tables
            .webhooks
            .retain(|w| !(w.id == webhook_id && w.user_id == owner_id));
        let deleted = (before - tables.webhooks.len()) as u64;
        if deleted > 0 {
            tables.requests.retain(|r| r.webhook_id != webhook_id);
        }
        Ok(deleted)
    }

    async fn upsert_user(&self, id: &str, email: Option<&str>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let email_taken = email.is_some()
            && tables
                .users
                .iter()
                .any(|u| u.id != id && u.email.as_deref() == email);

        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            // Emails stay unique: an address held by another user is not taken over.
            if email.is_some() && !email_taken {
                user.email = email.map(str::to_string);
            }
            return Ok(());
        }

        if let Some(email) = email {
            if let Some(pos) = tables
                .users
                .iter()
                .position(|u| u.email.as_deref() == Some(email))
            {
                let old_id = std::mem::replace(&mut tables.users[pos].id, id.to_string());
                for webhook in tables.webhooks.iter_mut().filter(|w| w.user_id == old_id) {
                    webhook.user_id = id.to_string();
                }
                return Ok(());
            }
        }

        tables.users.push(StoredUser {
            id: id.to_string(),
            email: email.map(str::to_string),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FailingStore
// ---------------------------------------------------------------------------

/// A store that is down: every call fails, except that a forward target
/// can be configured for `get_forward_url`.
#[derive(Default)]
pub struct FailingStore {
    calls: AtomicUsize,
    forward_target: Option<String>,
}

impl FailingStore {
    /// Saves fail but the forward lookup still answers with `target`.
    pub fn with_forward_target(target: impl Into<String>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            forward_target: Some(target.into()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn create_or_update_webhook(&self, _: &NewWebhook) -> Result<u64, StoreError> {
        self.fail()
    }
    async fn get_forward_url(&self, _: &str) -> Result<Option<String>, StoreError> {
        match &self.forward_target {
            Some(target) => {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(Some(target.clone()))
            }
            None => self.fail(),
        }
    }
    async fn save_captured_request(&self, _: &NewCapturedRequest) -> Result<(), StoreError> {
        self.fail()
    }
    async fn list_captured_requests(
        &self,
        _: &str,
        _: i64,
    ) -> Result<Vec<CapturedRequest>, StoreError> {
        self.fail()
    }
    async fn clear_captured_requests(&self, _: &str) -> Result<u64, StoreError> {
        self.fail()
    }
    async fn check_ownership(&self, _: &str, _: &str) -> Result<bool, StoreError> {
        self.fail()
    }
    async fn get_webhook(&self, _: &str, _: &str) -> Result<Option<Webhook>, StoreError> {
        self.fail()
    }
    async fn list_webhooks_for_owner(&self, _: &str) -> Result<Vec<Webhook>, StoreError> {
        self.fail()
    }
    async fn update_webhook(&self, _: &str, _: &str, _: &WebhookUpdate) -> Result<u64, StoreError> {
        self.fail()
    }
    async fn delete_webhook(&self, _: &str, _: &str) -> Result<u64, StoreError> {
        self.fail()
    }
    async fn upsert_user(&self, _: &str, _: Option<&str>) -> Result<(), StoreError> {
        self.fail()
    }
}

// ---------------------------------------------------------------------------
// App helpers
// ---------------------------------------------------------------------------

pub fn test_config() -> Config {
    Config {
        port: 0,
        base_url: "https://hooks.test".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        database_url: String::new(),
        db_max_connections: 1,
        db_connect_attempts: 1,
        db_retry_delay_ms: 0,
        forward_timeout_ms: 5_000,
        inspect_default_limit: 100,
        token_ttl_secs: 3600,
    }
}

pub fn forwarder(timeout: Duration) -> Forwarder {
    Forwarder::new(timeout)
}

/// Router over `store` with the given forward timeout.
pub fn app_with_timeout(store: Arc<dyn Store>, timeout: Duration) -> Router {
    router(AppState::with_forwarder(test_config(), store, forwarder(timeout)))
}

pub fn app(store: Arc<dyn Store>) -> Router {
    app_with_timeout(store, Duration::from_secs(5))
}

pub fn token_for(user_id: &str) -> String {
    issue_token(
        user_id,
        Some(&format!("{user_id}@example.com")),
        JWT_SECRET,
        Duration::from_secs(3600),
    )
    .expect("token")
}

/// Build a request; `token` adds a bearer credential, `body` is sent as JSON.
pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}

/// Send one request through the router and decode the JSON response.
pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

/// Create a webhook through the API and return its id.
pub async fn create_webhook_as(app: &Router, user_id: &str, name: &str, source_type: &str) -> String {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/webhooks",
            Some(&token_for(user_id)),
            Some(serde_json::json!({ "name": name, "source_type": source_type })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

/// Poll a wiremock server until it has seen `count` requests or `timeout` elapses.
pub async fn wait_for_requests(
    server: &wiremock::MockServer,
    count: usize,
    timeout: Duration,
) -> Vec<wiremock::Request> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= count || tokio::time::Instant::now() >= deadline {
            return received;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
