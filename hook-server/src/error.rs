//! Error type for the management API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed body or missing field; the message is shown to the client.
    #[error("{0}")]
    BadRequest(String),

    #[error("unauthenticated: {0}")]
    Unauthorized(#[from] AuthError),

    /// Unknown webhook, or a webhook owned by someone else.
    #[error("webhook not found")]
    NotFound,

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(&'static str),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Unauthorized(reason) => {
                warn!(reason = %reason, "request_unauthenticated");
                (
                    StatusCode::UNAUTHORIZED,
                    "Invalid or missing credentials".to_string(),
                )
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Webhook not found".to_string()),
            ApiError::Store(e) => {
                error!(error = %e, "store_operation_failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Internal(message) => {
                error!(message = %message, "internal_error");
                (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
