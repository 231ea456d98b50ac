//! Request extractors.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::auth::{bearer_token, validate_token};
use crate::error::ApiError;
use crate::web::AppState;

/// Caller identity from a valid bearer token.
///
/// Adding this extractor to a handler makes the route protected; a missing
/// or invalid token short-circuits with 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let caller = validate_token(token, &state.config.jwt_secret)?;

        Ok(AuthenticatedUser {
            user_id: caller.user_id,
            email: caller.email,
        })
    }
}
