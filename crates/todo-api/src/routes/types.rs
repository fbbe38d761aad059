//! Request/Response DTOs

use serde::{Deserialize, Serialize};

// ==================== Auth Types ====================

/// Registration request
///
/// Fields are optional so a missing one maps to a 400 envelope rather
/// than an extractor rejection.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Token issued on registration or login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub message: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
}

/// Result of a token verification
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub subject: String,
    pub name: Option<String>,
}
