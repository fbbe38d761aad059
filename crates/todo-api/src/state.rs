//! Application state

use std::sync::Arc;
use todo_auth::{JwtManager, RequestGate};
use todo_db::UserStore;

/// Prometheus recorder handle rendered by `/metrics`
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub jwt: Arc<JwtManager>,
    pub gate: Arc<RequestGate>,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        jwt: Arc<JwtManager>,
        gate: Arc<RequestGate>,
    ) -> Self {
        Self {
            users,
            jwt,
            gate,
        }
    }
}
