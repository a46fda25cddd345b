use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// API error taxonomy. Every handler returns `Result<_, ApiError>` and the
/// `IntoResponse` impl maps each variant to a status code and an
/// `{"error": "..."}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input (400)
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid or expired token (401)
    #[error("{0}")]
    Authentication(String),

    /// Authenticated but not allowed (403)
    #[error("{0}")]
    Authorization(String),

    /// Entity does not exist (404)
    #[error("{0}")]
    NotFound(String),

    /// State conflict: already matched/claimed, has dependents (409)
    #[error("{0}")]
    Conflict(String),

    /// Media store or identity provider failure (502)
    #[error("upstream dependency failed: {0}")]
    Dependency(String),

    /// Unexpected failure (500)
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Dependency(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the logs, not in the response body.
        let message = match &self {
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "Unexpected internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => ApiError::NotFound("entity not found".to_string()),
            other => ApiError::Internal(other.into()),
        }
    }
}
