//! Todo App REST API
//!
//! This crate provides the Axum-based HTTP surface: account registration,
//! login and token verification, the authenticated `/api/me` endpoint,
//! health checks and metrics, all behind the bearer-token gate.

pub mod error;
pub mod response;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use response::ApiResponse;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
