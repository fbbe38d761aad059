//! Current identity endpoint

use axum::{Router, routing::get};
use todo_auth::Principal;

use crate::response::ApiResponse;
use crate::state::AppState;

use super::auth::RequireAuth;

/// GET /api/me
async fn me(RequireAuth(principal): RequireAuth) -> ApiResponse<Principal> {
    ApiResponse::ok("Authenticated", principal)
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/me", get(me))
}
