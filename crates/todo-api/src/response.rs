//! Response envelope

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// JSON envelope wrapping every API response body
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub status: u16,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, data)
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            status: status.as_u16(),
        }
    }
}

impl ApiResponse<()> {
    /// Envelope without data, used for errors
    pub fn empty(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
            status: status.as_u16(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
