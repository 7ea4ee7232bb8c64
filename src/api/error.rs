use crate::services::error::AvatarError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl From<AvatarError> for AppError {
    fn from(err: AvatarError) -> Self {
        match err {
            AvatarError::IdentityMissing => AppError::Unauthorized("Not signed in".to_string()),
            AvatarError::InvalidUpload(reason) => {
                tracing::info!("Rejected avatar upload: {}", reason);
                AppError::BadRequest("Invalid upload".to_string())
            }
            AvatarError::UserNotFound(_) => AppError::NotFound("User not found".to_string()),
            AvatarError::AvatarMissing(_) => AppError::NotFound("Avatar not found".to_string()),
            AvatarError::ConcurrentModification { .. } => {
                AppError::Conflict("Avatar changed concurrently, upload again".to_string())
            }
            AvatarError::UpstreamUnavailable(e) => AppError::Anyhow(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Anyhow(e) => {
                tracing::error!("Upstream error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
