//! Protected management endpoints.
//!
//! Every handler takes an [`AuthenticatedUser`]; every handler that touches
//! a single webhook runs the ownership guard first and answers 404 when it
//! fails, whether the webhook is missing or owned by someone else.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use url::Url;

use crate::auth::authorize;
use crate::config::INSPECT_MAX_LIMIT;
use crate::error::ApiError;
use crate::store::{CapturedRequest, NewWebhook, Webhook, WebhookUpdate};
use crate::util::{generate_id, is_valid_id, DEFAULT_ID_LENGTH};
use crate::web::{AppState, AuthenticatedUser};

/// Fresh ids tried before giving up on an id collision.
const MAX_ID_ATTEMPTS: usize = 3;

#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source_type: String,
    #[serde(default)]
    pub forward_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateWebhookResponse {
    pub id: String,
    pub webhook_url: String,
    pub inspect_url: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub message: &'static str,
    pub deleted: u64,
}

#[derive(Debug, Deserialize)]
pub struct InspectQuery {
    pub limit: Option<i64>,
}

/// Reject anything that is not an absolute http(s) URL. An empty string is
/// allowed and means "no forwarding".
fn validate_forward_url(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            Ok(trimmed.to_string())
        }
        _ => Err(ApiError::BadRequest(
            "forward_url must be an absolute http or https URL".to_string(),
        )),
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e.body_text())))
}

/// Ownership gate shared by the single-webhook handlers.
async fn require_owner(
    state: &AppState,
    webhook_id: &str,
    user: &AuthenticatedUser,
) -> Result<(), ApiError> {
    if !is_valid_id(webhook_id) {
        return Err(ApiError::NotFound);
    }

    if authorize(state.store.as_ref(), webhook_id, &user.user_id).await? {
        Ok(())
    } else {
        Err(ApiError::NotFound)
    }
}

/// `POST /create` and `POST /webhooks`.
pub async fn create_webhook(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    body: Result<Json<CreateWebhookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateWebhookResponse>), ApiError> {
    let req = json_body(body)?;

    let name = req.name.trim();
    let source_type = req.source_type.trim();
    if name.is_empty() || source_type.is_empty() {
        return Err(ApiError::BadRequest(
            "name and source_type are required".to_string(),
        ));
    }
    let forward_url = validate_forward_url(req.forward_url.as_deref().unwrap_or(""))?;

    state
        .store
        .upsert_user(&user.user_id, user.email.as_deref())
        .await?;

    for attempt in 1..=MAX_ID_ATTEMPTS {
        let id = generate_id(DEFAULT_ID_LENGTH).map_err(|e| {
            error!(error = %e, "webhook_id_generation_failed");
            ApiError::Internal("Failed to generate ID")
        })?;

        let webhook = NewWebhook {
            id: id.clone(),
            user_id: user.user_id.clone(),
            forward_url: forward_url.clone(),
            name: name.to_string(),
            source_type: source_type.to_string(),
        };

        if state.store.create_or_update_webhook(&webhook).await? > 0 {
            info!(
                webhook_id = %id,
                user_id = %user.user_id,
                source_type = %source_type,
                forwarding = !forward_url.is_empty(),
                "webhook_created"
            );

            let response = CreateWebhookResponse {
                webhook_url: state.config.webhook_url(&id),
                inspect_url: state.config.inspect_url(&id),
                id,
            };
            return Ok((StatusCode::CREATED, Json(response)));
        }

        warn!(attempt = attempt, "webhook_id_collision");
    }

    Err(ApiError::Internal("Failed to allocate webhook ID"))
}

/// `GET /webhooks`: the caller's webhooks, newest first.
pub async fn list_webhooks(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Webhook>>, ApiError> {
    let webhooks = state.store.list_webhooks_for_owner(&user.user_id).await?;
    Ok(Json(webhooks))
}

/// `GET /webhooks/:id`
pub async fn get_webhook(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<Webhook>, ApiError> {
    require_owner(&state, &id, &user).await?;

    state
        .store
        .get_webhook(&id, &user.user_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// `PUT /webhooks/:id`: change the name and/or forward URL.
pub async fn update_webhook(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    body: Result<Json<WebhookUpdate>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_owner(&state, &id, &user).await?;

    let mut update = json_body(body)?;
    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "name or forward_url is required".to_string(),
        ));
    }
    if let Some(name) = update.name.as_mut() {
        *name = name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::BadRequest("name cannot be empty".to_string()));
        }
    }
    if let Some(forward_url) = update.forward_url.take() {
        update.forward_url = Some(validate_forward_url(&forward_url)?);
    }

    if state.store.update_webhook(&id, &user.user_id, &update).await? == 0 {
        return Err(ApiError::NotFound);
    }

    info!(
        webhook_id = %id,
        name_changed = update.name.is_some(),
        forward_url_changed = update.forward_url.is_some(),
        "webhook_updated"
    );

    Ok(Json(MessageResponse {
        message: "Webhook updated successfully",
    }))
}

/// `DELETE /webhooks/:id`: removes the webhook and its captured requests.
pub async fn delete_webhook(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_owner(&state, &id, &user).await?;

    if state.store.delete_webhook(&id, &user.user_id).await? == 0 {
        return Err(ApiError::NotFound);
    }

    info!(webhook_id = %id, user_id = %user.user_id, "webhook_deleted");

    Ok(Json(MessageResponse {
        message: "Webhook deleted successfully",
    }))
}

/// `GET /inspect/:id`: captured requests, newest first.
pub async fn inspect_webhook(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    query: Result<Query<InspectQuery>, QueryRejection>,
) -> Result<Json<Vec<CapturedRequest>>, ApiError> {
    let Query(query) =
        query.map_err(|e| ApiError::BadRequest(format!("Invalid query: {}", e.body_text())))?;

    require_owner(&state, &id, &user).await?;

    let limit = query
        .limit
        .unwrap_or(state.config.inspect_default_limit)
        .clamp(1, INSPECT_MAX_LIMIT);

    let requests = state.store.list_captured_requests(&id, limit).await?;
    Ok(Json(requests))
}

/// `DELETE /inspect/:id`: clears captured requests, keeps the webhook.
pub async fn clear_requests(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<ClearResponse>, ApiError> {
    require_owner(&state, &id, &user).await?;

    let deleted = state.store.clear_captured_requests(&id).await?;
    info!(webhook_id = %id, deleted = deleted, "webhook_requests_cleared");

    Ok(Json(ClearResponse {
        message: "Requests cleared",
        deleted,
    }))
}
