// Public API - what other modules can use
pub use errors::{TournamentError, TournamentResult};
pub use leaderboard::{build_leaderboard, ByeScoring, LeaderboardEntry};
pub use pairing::{plan_round, PairingCandidate, RoundPlan};
pub use repository::{
    InMemoryTournamentRepository, PostgresTournamentRepository, TournamentRepository,
};
pub use roster::{EliminationPolicy, ELIMINATION_THRESHOLD};
pub use service::TournamentService;

// Internal modules
pub mod errors;
mod handlers;
pub mod leaderboard;
pub mod models;
pub mod pairing;
pub mod repository;
pub mod roster;
mod service;
pub mod types;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::shared::AppState;

/// All tournament routes, ready to receive the shared state
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/tournaments", post(handlers::create_tournament))
        .route("/tournaments/latest", get(handlers::latest_tournament))
        .route(
            "/tournaments/:id",
            get(handlers::get_tournament).delete(handlers::reset_tournament),
        )
        .route("/tournaments/:id/apply", post(handlers::apply_to_tournament))
        .route("/tournaments/:id/close", post(handlers::close_tournament))
        .route("/tournaments/:id/start", post(handlers::start_tournament))
        .route("/tournaments/:id/next-round", post(handlers::advance_round))
        .route("/tournaments/:id/matches", get(handlers::list_matches))
        .route("/tournaments/:id/leaderboard", get(handlers::get_leaderboard))
        .route("/matches/:id", put(handlers::record_match_result))
        .route("/users/:id/notifications", get(handlers::get_notifications))
        .route("/rankings", post(handlers::record_ranking))
        .route("/users/:id/rankings", get(handlers::get_rankings))
}
