//! Bearer token verification and issuance.
//!
//! Tokens are JWTs signed with the shared `JWT_SECRET`. Only the HMAC family
//! is accepted, which rules out algorithm-confusion tokens (`none`, RSA/EC
//! headers presented with the shared secret as a "public key").

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Clock skew tolerance for `exp`, in seconds.
const LEEWAY_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingCredential,

    #[error("authorization header is not a bearer token")]
    InvalidScheme,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token has no subject")]
    MissingSubject,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Claims read from and written to bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Older tokens carried the caller id here instead of `sub`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub exp: u64,

    #[serde(default)]
    pub iat: u64,
}

/// Identity extracted from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub email: Option<String>,
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::InvalidScheme)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidScheme)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }

    Ok(token)
}

/// Verify a bearer token and return the caller it names.
///
/// # Errors
///
/// - `UnsupportedAlgorithm` when the header names anything but HS256/384/512
/// - `Expired` when `exp` is in the past (beyond the leeway)
/// - `InvalidSignature` when the token was not signed with `secret`
/// - `MissingSubject` when neither `sub` nor `id` carries a caller id
/// - `Malformed` for everything else, including a missing `exp`
pub fn validate_token(token: &str, secret: &str) -> Result<Caller, AuthError> {
    let header = decode_header(token).map_err(|e| AuthError::Malformed(e.to_string()))?;
    if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
        return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
    }

    let mut validation = Validation::new(header.alg);
    validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
    validation.leeway = LEEWAY_SECS;
    validation.validate_aud = false;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidAlgorithm => AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)),
        _ => AuthError::Malformed(e.to_string()),
    })?;

    let claims = data.claims;
    let user_id = non_empty(claims.sub)
        .or_else(|| non_empty(claims.id))
        .ok_or(AuthError::MissingSubject)?;

    Ok(Caller {
        user_id,
        email: non_empty(claims.email),
    })
}

/// Sign an HS256 token for `user_id` that expires after `ttl`.
pub fn issue_token(
    user_id: &str,
    email: Option<&str>,
    secret: &str,
    ttl: Duration,
) -> Result<String, AuthError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AuthError::Signing(e.to_string()))?
        .as_secs();

    let claims = Claims {
        sub: Some(user_id.to_string()),
        id: None,
        email: email.map(str::to_string),
        exp: now + ttl.as_secs(),
        iat: now,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Signing(e.to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
