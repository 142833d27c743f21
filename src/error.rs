use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::state::state_machine::InvalidTransition;

/// Errors produced by the session engine.
///
/// None of these are fatal: callers either swallow them (a late answer, a
/// duplicate start) or surface a single `error` event to the offending
/// connection.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The referenced session does not exist in the registry.
    #[error("game session `{0}` not found")]
    SessionNotFound(String),
    /// The player id is not part of the session it was used against.
    #[error("player `{0}` is not part of this session")]
    UnknownPlayer(Uuid),
    /// An answer arrived while no question was open.
    #[error("no question is currently open")]
    NoActiveQuestion,
    /// The player already answered the current question.
    #[error("player already answered the current question")]
    AlreadyAnswered,
    /// The requested lifecycle change is not allowed from the current phase.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// The client message could not be decoded into a known action.
    #[error("malformed client message: {0}")]
    MalformedMessage(String),
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match &err {
            EngineError::SessionNotFound(_) => AppError::NotFound(err.to_string()),
            _ => AppError::BadRequest(err.to_string()),
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
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
