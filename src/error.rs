use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors returned by service operations.
///
/// Ignorable input (a late buzz, an unknown key) is never an error: those
/// operations return outcome enums instead.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A storage collaborator failed (question file, export encoding).
    #[error(transparent)]
    Unavailable(StorageError),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The request names something that does not fit the session (row, name, column length).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Malformed { .. } => ServiceError::InvalidInput(err.to_string()),
            StorageError::Unavailable { .. } => ServiceError::Unavailable(err),
        }
    }
}

/// Errors rendered as HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {err}"))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorBody {
            message: self.to_string(),
        });
        (self.status(), payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_storage_input_is_a_bad_request() {
        let err = StorageError::malformed("bad csv".into(), std::fmt::Error);
        let app: AppError = ServiceError::from(err).into();
        assert_eq!(app.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unreachable_storage_is_unavailable() {
        let err = StorageError::unavailable(
            "disk gone".into(),
            std::io::Error::other("no space left"),
        );
        let app: AppError = ServiceError::from(err).into();
        assert_eq!(app.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn service_errors_map_to_statuses() {
        let cases = [
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::InvalidState("x".into()), StatusCode::CONFLICT),
            (ServiceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
