//! PostgreSQL implementation of [`Store`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use tokio::time::sleep;
use tracing::{info, warn};

use super::{
    CapturedRequest, HeaderMultimap, NewCapturedRequest, NewWebhook, Store, StoreError, Webhook,
    WebhookUpdate,
};
use crate::Config;

/// Postgres names the unique constraint on `users.email` this way by default.
const USERS_EMAIL_KEY: &str = "users_email_key";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id VARCHAR(255) PRIMARY KEY,
        email VARCHAR(255) UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS webhooks (
        id VARCHAR(255) PRIMARY KEY,
        user_id VARCHAR(255) NOT NULL REFERENCES users(id) ON DELETE CASCADE ON UPDATE CASCADE,
        forward_url TEXT NOT NULL DEFAULT '',
        name VARCHAR(255) NOT NULL DEFAULT '',
        source_type VARCHAR(50) NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS requests (
        request_id BIGSERIAL PRIMARY KEY,
        webhook_id VARCHAR(255) NOT NULL REFERENCES webhooks(id) ON DELETE CASCADE,
        method TEXT NOT NULL,
        headers JSONB NOT NULL DEFAULT '{}'::jsonb,
        body BYTEA NOT NULL,
        received_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS requests_webhook_received_idx
        ON requests (webhook_id, received_at DESC)",
];

const WEBHOOK_COLUMNS: &str = "id, user_id, COALESCE(forward_url, '') AS forward_url, \
     COALESCE(name, '') AS name, COALESCE(source_type, '') AS source_type, created_at";

#[derive(sqlx::FromRow)]
struct CapturedRequestRow {
    request_id: i64,
    webhook_id: String,
    method: String,
    headers: Json<HeaderMultimap>,
    body: Vec<u8>,
    received_at: DateTime<Utc>,
}

impl From<CapturedRequestRow> for CapturedRequest {
    fn from(row: CapturedRequestRow) -> Self {
        CapturedRequest {
            request_id: row.request_id,
            webhook_id: row.webhook_id,
            method: row.method,
            headers: row.headers.0,
            body: row.body,
            received_at: row.received_at,
        }
    }
}

/// Store backed by a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database, retrying up to `db_connect_attempts` times.
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let max_attempts = config.db_connect_attempts;
        let mut attempt = 1;

        loop {
            let result = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&config.database_url)
                .await;

            match result {
                Ok(pool) => {
                    info!(attempt = attempt, "database_connected");
                    return Ok(Self::new(pool));
                }
                Err(e) if attempt < max_attempts => {
                    warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        retry_in_ms = config.db_retry_delay_ms,
                        error = %e,
                        "database_connect_failed"
                    );
                    sleep(config.db_retry_delay()).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!(statements = SCHEMA.len(), "database_migrated");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("database_pool_closed");
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_or_update_webhook(&self, webhook: &NewWebhook) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO webhooks (id, user_id, forward_url, name, source_type)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                forward_url = EXCLUDED.forward_url,
                name = EXCLUDED.name,
                source_type = EXCLUDED.source_type
             WHERE webhooks.user_id = EXCLUDED.user_id",
        )
        .bind(&webhook.id)
        .bind(&webhook.user_id)
        .bind(&webhook.forward_url)
        .bind(&webhook.name)
        .bind(&webhook.source_type)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_forward_url(&self, webhook_id: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT forward_url FROM webhooks WHERE id = $1")
                .bind(webhook_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row
            .and_then(|(url,)| url)
            .filter(|url| !url.trim().is_empty()))
    }

    async fn save_captured_request(&self, request: &NewCapturedRequest) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO requests (webhook_id, method, headers, body, received_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&request.webhook_id)
        .bind(&request.method)
        .bind(Json(&request.headers))
        .bind(&request.body)
        .bind(request.received_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(StoreError::UnknownWebhook(request.webhook_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_captured_requests(
        &self,
        webhook_id: &str,
        limit: i64,
    ) -> Result<Vec<CapturedRequest>, StoreError> {
        let rows: Vec<CapturedRequestRow> = sqlx::query_as(
            "SELECT request_id, webhook_id, method, headers, body, received_at
             FROM requests
             WHERE webhook_id = $1
             ORDER BY received_at DESC, request_id DESC
             LIMIT $2",
        )
        .bind(webhook_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CapturedRequest::from).collect())
    }

    async fn clear_captured_requests(&self, webhook_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM requests WHERE webhook_id = $1")
            .bind(webhook_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn check_ownership(&self, webhook_id: &str, owner_id: &str) -> Result<bool, StoreError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM webhooks WHERE id = $1 AND user_id = $2)",
        )
        .bind(webhook_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn get_webhook(
        &self,
        webhook_id: &str,
        owner_id: &str,
    ) -> Result<Option<Webhook>, StoreError> {
        let query = format!(
            "SELECT {} FROM webhooks WHERE id = $1 AND user_id = $2",
            WEBHOOK_COLUMNS
        );

        let webhook = sqlx::query_as(&query)
            .bind(webhook_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(webhook)
    }

    async fn list_webhooks_for_owner(&self, owner_id: &str) -> Result<Vec<Webhook>, StoreError> {
        let query = format!(
            "SELECT {} FROM webhooks WHERE user_id = $1 ORDER BY created_at DESC",
            WEBHOOK_COLUMNS
        );

        let webhooks = sqlx::query_as(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(webhooks)
    }

    async fn update_webhook(
        &self,
        webhook_id: &str,
        owner_id: &str,
        update: &WebhookUpdate,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE webhooks
             SET name = COALESCE($1, name),
                 forward_url = COALESCE($2, forward_url)
             WHERE id = $3 AND user_id = $4",
        )
        .bind(update.name.as_deref())
        .bind(update.forward_url.as_deref())
        .bind(webhook_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_webhook(&self, webhook_id: &str, owner_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM webhooks WHERE id = $1 AND user_id = $2")
            .bind(webhook_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn upsert_user(&self, id: &str, email: Option<&str>) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO users (id, email) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET email = COALESCE(EXCLUDED.email, users.email)",
        )
        .bind(id)
        .bind(email)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.constraint() == Some(USERS_EMAIL_KEY) => {
                // The email belongs to another id. Move that row to `id` when
                // `id` is new; an existing `id` keeps its row and email.
                let moved = sqlx::query(
                    "UPDATE users SET id = $1
                     WHERE email = $2
                       AND NOT EXISTS (SELECT 1 FROM users WHERE id = $1)",
                )
                .bind(id)
                .bind(email)
                .execute(&self.pool)
                .await?;

                if moved.rows_affected() > 0 {
                    info!(user_id = %id, "user_id_reassigned_by_email");
                } else {
                    warn!(user_id = %id, "user_email_owned_by_other_user");
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
