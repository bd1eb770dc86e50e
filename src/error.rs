use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// The viewer's stream ended. Normal termination, not a failure.
    #[error("Stream closed")]
    StreamClosed,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Invalid input"),
            AppError::StoreUnavailable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
            }
            AppError::StreamClosed => (StatusCode::GONE, "Stream closed"),
        };

        let body = if status.is_server_error() {
            error!("request failed: {}", self);
            Json(json!({ "error": error_message }))
        } else {
            Json(json!({
                "error": error_message,
                "details": self.to_string()
            }))
        };

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        AppError::StoreUnavailable(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::StoreUnavailable(format!("malformed relay payload: {error}"))
    }
}
