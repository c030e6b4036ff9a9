use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("State conflict: {message}")]
    StateConflict { message: String },

    #[error("Concurrent modification of {center_id}: expected revision {expected_revision}")]
    ConcurrentModification {
        center_id: String,
        expected_revision: i64,
    },

    #[error("Connection failed to {target}: {cause}")]
    ConnectionFailed { target: String, cause: String },

    #[error("Storage operation {operation} failed: {cause}")]
    Storage { operation: String, cause: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        RegistryError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        RegistryError::NotFound {
            message: message.into(),
        }
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        RegistryError::StateConflict {
            message: message.into(),
        }
    }

    pub fn storage(operation: &str, cause: impl ToString) -> Self {
        RegistryError::Storage {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            RegistryError::InvalidArgument { message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "invalid_argument".to_string(),
                    message: message.clone(),
                    cause: None,
                },
            ),
            RegistryError::NotFound { message } => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: "not_found".to_string(),
                    message: message.clone(),
                    cause: None,
                },
            ),
            RegistryError::StateConflict { message } => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: "state_conflict".to_string(),
                    message: message.clone(),
                    cause: None,
                },
            ),
            RegistryError::ConcurrentModification {
                center_id,
                expected_revision,
            } => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: "concurrent_modification".to_string(),
                    message: format!(
                        "Datacenter '{}' changed since revision {} was read",
                        center_id, expected_revision
                    ),
                    cause: None,
                },
            ),
            RegistryError::ConnectionFailed { target, cause } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error: "connection_failed".to_string(),
                    message: format!("Failed to connect to '{}'", target),
                    cause: Some(cause.clone()),
                },
            ),
            RegistryError::Storage { operation, cause } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "storage_error".to_string(),
                    message: format!("Storage operation '{}' failed", operation),
                    cause: Some(cause.clone()),
                },
            ),
            RegistryError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "internal_error".to_string(),
                    message: msg.clone(),
                    cause: None,
                },
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<tokio_postgres::Error> for RegistryError {
    fn from(err: tokio_postgres::Error) -> Self {
        RegistryError::storage("query", err)
    }
}

impl From<deadpool_postgres::PoolError> for RegistryError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        RegistryError::ConnectionFailed {
            target: "postgres".to_string(),
            cause: format!("Pool error: {}", err),
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Internal(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = vec![
            (RegistryError::invalid_argument("x"), StatusCode::BAD_REQUEST),
            (RegistryError::not_found("x"), StatusCode::NOT_FOUND),
            (RegistryError::state_conflict("x"), StatusCode::CONFLICT),
            (
                RegistryError::ConcurrentModification {
                    center_id: "CA".to_string(),
                    expected_revision: 3,
                },
                StatusCode::CONFLICT,
            ),
            (
                RegistryError::ConnectionFailed {
                    target: "postgres".to_string(),
                    cause: "refused".to_string(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                RegistryError::storage("insert_one", "boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_display_includes_message() {
        let err = RegistryError::invalid_argument("centerId is missing");
        assert_eq!(err.to_string(), "Invalid argument: centerId is missing");
    }
}
