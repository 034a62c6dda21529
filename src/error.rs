use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or missing required input.
    #[error("{0}")]
    InvalidInput(String),

    /// Uniqueness violation (duplicate email, like, follow...).
    #[error("{0}")]
    Conflict(String),

    /// No credential supplied.
    #[error("Authentication required")]
    Unauthenticated,

    /// Bad credential: unknown login, wrong password, bad token signature.
    #[error("{0}")]
    InvalidCredential(String),

    /// Token signature is valid but the token has expired.
    #[error("Token expired")]
    CredentialExpired,

    /// Token is valid but its subject no longer exists.
    #[error("User not found")]
    UnknownSubject,

    /// Authenticated but not the owner of the resource.
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// PDF parsing or preview generation failed.
    #[error("Processing error: {0}")]
    Processing(String),

    /// Blob storage backend failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated
            | AppError::InvalidCredential(_)
            | AppError::CredentialExpired
            | AppError::UnknownSubject => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
            match self {
                AppError::Processing(_) => "Failed to process PDF".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_a_client_error() {
        let err = AppError::Conflict("Post already liked".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn credential_failures_are_unauthorized() {
        for err in [
            AppError::Unauthenticated,
            AppError::InvalidCredential("Invalid token".to_string()),
            AppError::CredentialExpired,
            AppError::UnknownSubject,
        ] {
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn server_errors_hide_detail() {
        let response = AppError::Internal("disk on fire".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = AppError::Processing("bad xref".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
