use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::{
    leaderboard::LeaderboardEntry,
    models::{MatchDetails, MatchId, NotificationModel, RankingModel, TournamentId, UserId},
    types::{
        ApplyRequest, CreateTournamentRequest, ParticipantResponse, RecordRankingRequest,
        RecordResultRequest, StartedRound, TournamentDetailsResponse, TournamentResponse,
    },
};
use crate::shared::{AppError, AppState};

/// POST /tournaments
#[instrument(name = "create_tournament", skip(state, payload))]
pub async fn create_tournament(
    State(state): State<AppState>,
    payload: Result<Json<CreateTournamentRequest>, JsonRejection>,
) -> Result<Json<TournamentResponse>, AppError> {
    let Json(request) = payload?;
    info!(name = %request.name, admin_id = request.admin_id, "Creating tournament");
    let tournament = state.tournament_service.create_tournament(request).await?;
    Ok(Json(tournament))
}

/// GET /tournaments/latest
#[instrument(name = "latest_tournament", skip(state))]
pub async fn latest_tournament(
    State(state): State<AppState>,
) -> Result<Json<TournamentDetailsResponse>, AppError> {
    let details = state.tournament_service.latest_tournament().await?;
    Ok(Json(details))
}

/// GET /tournaments/:id
#[instrument(name = "get_tournament", skip(state))]
pub async fn get_tournament(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<Json<TournamentDetailsResponse>, AppError> {
    let details = state
        .tournament_service
        .tournament_details(tournament_id)
        .await?;
    Ok(Json(details))
}

/// POST /tournaments/:id/apply
#[instrument(name = "apply_to_tournament", skip(state, payload))]
pub async fn apply_to_tournament(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
    payload: Result<Json<ApplyRequest>, JsonRejection>,
) -> Result<Json<ParticipantResponse>, AppError> {
    let Json(request) = payload?;
    let participant = state
        .tournament_service
        .apply(tournament_id, request.user_id, &request.username)
        .await?;
    Ok(Json(participant))
}

/// POST /tournaments/:id/close
#[instrument(name = "close_tournament", skip(state))]
pub async fn close_tournament(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<Json<TournamentResponse>, AppError> {
    let tournament = state
        .tournament_service
        .close_tournament(tournament_id)
        .await?;
    Ok(Json(tournament))
}

/// POST /tournaments/:id/start
#[instrument(name = "start_tournament", skip(state))]
pub async fn start_tournament(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<Json<StartedRound>, AppError> {
    let started = state
        .tournament_service
        .start_tournament(tournament_id)
        .await?;
    info!(
        tournament_id,
        match_count = started.round.matches.len(),
        "Tournament started"
    );
    Ok(Json(started))
}

/// POST /tournaments/:id/next-round
#[instrument(name = "advance_round", skip(state))]
pub async fn advance_round(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<Json<StartedRound>, AppError> {
    let started = state.tournament_service.advance_round(tournament_id).await?;
    info!(
        tournament_id,
        round_number = started.round.round_number,
        "Next round generated"
    );
    Ok(Json(started))
}

/// GET /tournaments/:id/matches
#[instrument(name = "list_matches", skip(state))]
pub async fn list_matches(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<Json<Vec<MatchDetails>>, AppError> {
    let matches = state.tournament_service.list_matches(tournament_id).await?;
    Ok(Json(matches))
}

/// GET /tournaments/:id/leaderboard
#[instrument(name = "get_leaderboard", skip(state))]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let leaderboard = state
        .tournament_service
        .get_leaderboard(tournament_id)
        .await?;
    Ok(Json(leaderboard))
}

/// DELETE /tournaments/:id
#[instrument(name = "reset_tournament", skip(state))]
pub async fn reset_tournament(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<StatusCode, AppError> {
    state
        .tournament_service
        .reset_tournament(tournament_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /matches/:id
#[instrument(name = "record_match_result", skip(state, payload))]
pub async fn record_match_result(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    payload: Result<Json<RecordResultRequest>, JsonRejection>,
) -> Result<Json<MatchDetails>, AppError> {
    let Json(request) = payload?;
    let details = state
        .tournament_service
        .record_match_result(match_id, request.winner_id, request.score)
        .await?;
    Ok(Json(details))
}

/// GET /users/:id/notifications
#[instrument(name = "get_notifications", skip(state))]
pub async fn get_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<NotificationModel>>, AppError> {
    let notifications = state
        .tournament_service
        .notifications_for_user(user_id)
        .await?;
    Ok(Json(notifications))
}

/// POST /rankings
#[instrument(name = "record_ranking", skip(state, payload))]
pub async fn record_ranking(
    State(state): State<AppState>,
    payload: Result<Json<RecordRankingRequest>, JsonRejection>,
) -> Result<Json<RankingModel>, AppError> {
    let Json(request) = payload?;
    let ranking = state.tournament_service.record_ranking(request).await?;
    Ok(Json(ranking))
}

/// GET /users/:id/rankings
#[instrument(name = "get_rankings", skip(state))]
pub async fn get_rankings(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<RankingModel>>, AppError> {
    let rankings = state.tournament_service.rankings_for_user(user_id).await?;
    Ok(Json(rankings))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
