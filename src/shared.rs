use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::tournament::{TournamentError, TournamentService};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub tournament_service: Arc<TournamentService>,
}

impl AppState {
    pub fn new(tournament_service: Arc<TournamentService>) -> Self {
        Self { tournament_service }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unprocessable: {0}")]
    UnprocessableEntity(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    Internal,
}

impl From<TournamentError> for AppError {
    fn from(error: TournamentError) -> Self {
        match error {
            TournamentError::Validation(msg) => AppError::BadRequest(msg),
            TournamentError::Conflict(msg) => AppError::Conflict(msg),
            TournamentError::NotFound(msg) => AppError::NotFound(msg),
            TournamentError::InvalidState(msg) => AppError::UnprocessableEntity(msg),
            e @ TournamentError::NoParticipants { .. } => {
                AppError::UnprocessableEntity(e.to_string())
            }
            TournamentError::Repository(msg) => AppError::DatabaseError(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::BytesRejection(error) => {
                warn!(%error, "Failed to buffer request body");
                AppError::Internal
            }
            rejection => AppError::BadRequest(rejection.body_text()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::UnprocessableEntity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
