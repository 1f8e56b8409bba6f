use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use courier_types::api::ErrorBody;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of the authentication and messaging operations. Store errors are
/// carried through unmodified.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No such user")]
    NoSuchUser,

    #[error("Invalid response to challenge")]
    InvalidResponse,

    #[error("Failed to send message")]
    MessageUnsent,

    #[error("Challenge must be {expected} bytes, got {actual}")]
    InvalidChallenge { expected: usize, actual: usize },

    #[error("Payload is not valid JSON: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    #[error("Invalid timestamp filter: {0:?}")]
    InvalidTimestamp(String),

    #[error("Store error: {0}")]
    Store(anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
}

/// HTTP-facing error: a status code plus a message safe to show clients.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn authentication_failed() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "authentication failed")
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::NoSuchUser => StatusCode::NOT_FOUND,
            Error::InvalidResponse => StatusCode::UNAUTHORIZED,
            Error::InvalidChallenge { .. }
            | Error::InvalidPayload(_)
            | Error::InvalidTimestamp(_) => StatusCode::BAD_REQUEST,
            Error::MessageUnsent | Error::Store(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Store details stay in the log
        let message = match &err {
            Error::Store(e) | Error::Internal(e) => {
                error!("{:#}", e);
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
