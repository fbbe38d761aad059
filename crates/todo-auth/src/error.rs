//! Authentication error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    #[error("Token is empty")]
    EmptyToken,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Unsupported token algorithm")]
    UnsupportedAlgorithm,

    #[error("Token expired")]
    TokenExpired,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Signing key initialization failed: {0}")]
    KeyInitialization(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Identity resolver unavailable: {0}")]
    ResolverUnavailable(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl AuthError {
    /// Short label used in logs and metric labels
    pub fn category(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "credentials",
            AuthError::MissingAuthHeader => "missing_header",
            AuthError::InvalidAuthHeader => "invalid_header",
            AuthError::EmptyToken => "empty",
            AuthError::MalformedToken(_) => "malformed",
            AuthError::InvalidSignature => "signature",
            AuthError::UnsupportedAlgorithm => "algorithm",
            AuthError::TokenExpired => "expired",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::KeyInitialization(_) => "key",
            AuthError::UserNotFound => "not_found",
            AuthError::ResolverUnavailable(_) => "resolver",
            AuthError::PasswordHash(_) => "password_hash",
            AuthError::Jwt(_) => "jwt",
        }
    }

    /// Whether this error came out of token verification
    pub fn is_token_failure(&self) -> bool {
        matches!(
            self,
            AuthError::EmptyToken
                | AuthError::MalformedToken(_)
                | AuthError::InvalidSignature
                | AuthError::UnsupportedAlgorithm
                | AuthError::TokenExpired
        )
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AuthError::EmptyToken
            | AuthError::MalformedToken(_)
            | AuthError::InvalidSignature
            | AuthError::UnsupportedAlgorithm
            | AuthError::TokenExpired
            | AuthError::Jwt(_) => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            AuthError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            AuthError::ResolverUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Identity service unavailable")
            }
            AuthError::KeyInitialization(_) | AuthError::PasswordHash(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        };

        let body = axum::Json(json!({
            "message": message,
            "data": null,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
