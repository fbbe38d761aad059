//! Authentication extractors and routes

use axum::{
    Json, Router,
    extract::{FromRequestParts, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, request::Parts},
    routing::{get, post},
};
use todo_auth::{Principal, extract_bearer_token, hash_password, verify_password};
use todo_db::NewUser;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;

use super::types::{AuthResponse, LoginRequest, RegisterRequest, VerifyResponse};

// ==================== Auth Extractors ====================

/// Extractor for the principal bound by the request gate (required)
pub struct RequireAuth(pub Principal);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))?;

        Ok(RequireAuth(principal))
    }
}

// ==================== Input Validation ====================

/// Maximum allowed email length
const MAX_EMAIL_LENGTH: usize = 254;
/// Maximum allowed password length (prevent DoS with very large passwords)
const MAX_PASSWORD_LENGTH: usize = 256;

/// Valid Argon2 hash that never matches, verified when the user is unknown
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dGltaW5nX2F0dGFja19wcmV2ZW50aW9u$K8rI5T7VdQ8xkO0GqK5K2w";

/// Trim a field and reject it when missing or blank
fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("{} is required", field))),
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Email exceeds maximum length of {} characters",
            MAX_EMAIL_LENGTH
        )));
    }
    if !email.contains('@') {
        return Err(ApiError::BadRequest("Email is invalid".to_string()));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

fn auth_response(state: &AppState, subject: &str, message: &str) -> Result<AuthResponse, ApiError> {
    let access_token = state.jwt.issue(subject, None)?;

    Ok(AuthResponse {
        access_token,
        message: message.to_string(),
        expires_in: state.jwt.lifetime().num_seconds(),
    })
}

// ==================== Auth Routes ====================

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<ApiResponse<AuthResponse>, ApiError> {
    let Json(request) = payload?;
    let email = required(&request.email, "Email")?;
    let password = required(&request.password, "Password")?;
    validate_credentials(email, password)?;

    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    if state.users.exists_by_email(email).await? {
        return Err(ApiError::Conflict("Email is already registered".to_string()));
    }

    let user = state
        .users
        .create_user(NewUser {
            name,
            email: email.to_string(),
            password_hash: hash_password(password)?,
        })
        .await?;

    info!("Registered user {} ({})", user.email, user.id);

    let body = auth_response(&state, &user.email, "Registered")?;
    Ok(ApiResponse::with_status(StatusCode::CREATED, "Registered", body))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<ApiResponse<AuthResponse>, ApiError> {
    let Json(request) = payload?;
    let email = required(&request.email, "Email")?;
    let password = required(&request.password, "Password")?;
    validate_credentials(email, password)?;

    debug!("Login attempt for {}", email);

    // Always verify, against a dummy hash when the user is unknown
    let user = state.users.find_by_email(email).await?;
    let hash = user.as_ref().map_or(DUMMY_HASH, |u| u.password_hash.as_str());

    let password_valid = verify_password(password, hash).unwrap_or_else(|e| {
        warn!("Password verification failed for {}: {}", email, e);
        false
    });

    let user = match (user, password_valid) {
        (Some(u), true) => u,
        _ => return Err(ApiError::Unauthorized("Invalid credentials".to_string())),
    };

    info!("User {} logged in", user.email);

    let body = auth_response(&state, &user.email, "Authenticated")?;
    Ok(ApiResponse::ok("Authenticated", body))
}

/// GET /api/auth/verify
///
/// Sits on a public path, so it reads the bearer header itself.
async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<ApiResponse<VerifyResponse>, ApiError> {
    let token = extract_bearer_token(&headers)
        .map_err(|_| ApiError::Unauthorized("Missing or invalid token".to_string()))?;

    let claims = state
        .jwt
        .verify(token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    // Name is best effort; lookup failures and timeouts still verify the token
    let name = match state.gate.lookup_identity(&claims.sub).await {
        Ok(identity) => identity.name,
        Err(e) => {
            debug!("No identity for {}: {}", claims.sub, e);
            None
        }
    };

    Ok(ApiResponse::ok(
        "Token is valid",
        VerifyResponse {
            subject: claims.sub,
            name,
        },
    ))
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/verify", get(verify))
}
