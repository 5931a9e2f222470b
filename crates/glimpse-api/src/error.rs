use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

use glimpse_stories::StoryError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Story(#[from] StoryError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Missing or invalid bearer token")]
    Unauthorized,

    #[error("Only the author can list a story's viewers")]
    Forbidden,

    #[error("Internal error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Story(StoryError::InvalidInput(_)) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Story(StoryError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Server-side detail stays in the log
        let message = if status.is_server_error() {
            warn!("Request failed: {}", self);
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "Service unavailable".to_string(),
                _ => "Internal error".to_string(),
            }
        } else {
            self.to_string()
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
