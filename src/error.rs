use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("DB error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// True for failures that happened while talking to the telemetry feed.
    pub fn is_upstream(&self) -> bool {
        matches!(self, AppError::Upstream(_) | AppError::Http(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Db(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::InvalidInput(ref msg) | AppError::InvalidPayload(ref msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::Json(ref e) => (StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", e)),
            AppError::Upstream(_) | AppError::Http(_) => {
                tracing::error!("Upstream error: {}", self);
                (StatusCode::BAD_GATEWAY, "Upstream error".to_string())
            }
            AppError::Timeout(ref msg) => {
                tracing::error!("Timeout: {}", msg);
                (StatusCode::GATEWAY_TIMEOUT, "Timed out".to_string())
            }
            AppError::Config(_) | AppError::Other(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
