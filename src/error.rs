use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::rules::RuleViolation};

/// Errors that can occur in service layer operations.
///
/// None of them leave a session partially updated.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The operation breaks the game rules.
    #[error(transparent)]
    Rejected(#[from] RuleViolation),
    /// No session with that id exists.
    #[error("session {0} not found")]
    SessionNotFound(Uuid),
    /// Storage backend is unavailable; the backend message is kept verbatim.
    #[error(transparent)]
    Unavailable(#[from] StorageError),
    /// No signed-in participant.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Every conditional update attempt lost against concurrent writers.
    #[error("session kept changing; gave up after {attempts} attempts")]
    Contended {
        /// Attempts made.
        attempts: u32,
    },
}

impl ServiceError {
    /// Rule violation carried by this error, if any.
    pub fn rule_violation(&self) -> Option<&RuleViolation> {
        match self {
            ServiceError::Rejected(violation) => Some(violation),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Storage backend unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Rejected(violation @ RuleViolation::CellOutOfRange { .. }) => {
                AppError::BadRequest(violation.to_string())
            }
            ServiceError::Rejected(violation) => AppError::Conflict(violation.to_string()),
            ServiceError::SessionNotFound(id) => AppError::NotFound(format!("session {id}")),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            err @ ServiceError::Contended { .. } => AppError::Conflict(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::SessionStatus;

    fn status_of(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn rule_violations_map_to_client_errors() {
        assert_eq!(
            status_of(RuleViolation::CellOutOfRange { cell: 9 }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(RuleViolation::CellOccupied { cell: 0 }.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(
                RuleViolation::NotJoinable {
                    status: SessionStatus::Active
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn missing_session_maps_to_not_found() {
        assert_eq!(
            status_of(ServiceError::SessionNotFound(Uuid::nil())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn storage_message_is_surfaced_verbatim() {
        let err = ServiceError::from(StorageError::unavailable(
            "couchdb",
            std::io::Error::other("connection refused"),
        ));
        assert_eq!(err.to_string(), "storage unavailable: connection refused");
        assert_eq!(status_of(err), StatusCode::SERVICE_UNAVAILABLE);
    }
}
