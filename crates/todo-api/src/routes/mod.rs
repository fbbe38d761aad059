//! API routes

mod auth;
mod health;
mod me;
pub mod metrics;
mod types;

use axum::{Router, middleware::from_fn_with_state};
use std::sync::Arc;
use todo_auth::{auth_middleware, require_auth};

use crate::state::{AppState, MetricsHandle};

pub use auth::RequireAuth;
pub use types::*;

/// Create the main router
///
/// Every route sits behind the request gate and the authorization
/// boundary; the path policy decides which of them actually need a token.
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let gate = state.gate.clone();

    let mut router = Router::new()
        // Health check
        .merge(health::routes())
        // Registration, login, verification
        .merge(auth::routes())
        // Authenticated identity
        .merge(me::routes())
        .with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
        .layer(from_fn_with_state(gate.clone(), require_auth))
        .layer(from_fn_with_state(gate, auth_middleware))
}
