// Library crate for the tournament bracket server
// This file exposes the public API for integration tests

pub mod config;
pub mod shared;
pub mod tournament;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

// Re-export commonly used types for easier access in tests
pub use config::{AppConfig, ConfigError};
pub use shared::{AppError, AppState};
pub use tournament::{
    InMemoryTournamentRepository, PostgresTournamentRepository, TournamentError,
    TournamentRepository, TournamentService,
};

/// Builds the full HTTP application around the given state
pub fn app(state: AppState) -> Router {
    tournament::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
