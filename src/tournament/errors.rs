use thiserror::Error;

use super::models::TournamentId;

#[derive(Debug, Error)]
pub enum TournamentError {
    /// Malformed input; nothing was written
    #[error("Validation error: {0}")]
    Validation(String),

    /// Lost a race against another writer (round number taken, match decided)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid tournament state: {0}")]
    InvalidState(String),

    #[error("Tournament {tournament_id} has no eligible participants")]
    NoParticipants { tournament_id: TournamentId },

    #[error("Repository error: {0}")]
    Repository(String),
}

impl From<sqlx::Error> for TournamentError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => TournamentError::NotFound(error.to_string()),
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                TournamentError::Conflict(db_error.message().to_string())
            }
            _ => TournamentError::Repository(error.to_string()),
        }
    }
}

pub type TournamentResult<T> = Result<T, TournamentError>;
