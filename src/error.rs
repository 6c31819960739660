use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Operation-level failures surfaced to the HTTP client. Every variant maps
/// to a status code and a `{ success: false, message }` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("Please verify your email to login")]
    NotVerified,
    #[error("User has already been verified")]
    AlreadyVerified,
    #[error("{0}")]
    InvalidOrExpiredToken(String),
    #[error("Password does not match")]
    PasswordMismatch,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Dependency(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotVerified => StatusCode::UNAUTHORIZED,
            ApiError::AlreadyVerified => StatusCode::BAD_REQUEST,
            ApiError::InvalidOrExpiredToken(_) => StatusCode::BAD_REQUEST,
            ApiError::PasswordMismatch => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Dependency(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Conflict("dup".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::NotFound("none".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::InvalidCredentials("bad".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::NotVerified.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::InvalidOrExpiredToken("gone".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::PasswordMismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Forbidden("admins only".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Dependency("smtp down".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_hides_cause() {
        let err = ApiError::Internal(anyhow::anyhow!("connection refused"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
