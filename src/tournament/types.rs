use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{
    MatchDetails, ParticipantModel, RoundId, RoundModel, TournamentId, TournamentModel,
    TournamentStatus, UserId,
};

/// Request payload for creating a tournament
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateTournamentRequest {
    pub admin_id: UserId,
    pub name: String,
    pub max_players: i32,
}

/// Request payload for applying to a tournament
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApplyRequest {
    pub user_id: UserId,
    pub username: String,
}

/// Request payload for entering a match result
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordResultRequest {
    pub winner_id: UserId,
    #[serde(default)]
    pub score: Option<String>,
}

/// Request payload for the legacy rankings table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordRankingRequest {
    pub user_id: UserId,
    pub tournament_id: TournamentId,
    pub rank: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentResponse {
    pub id: TournamentId,
    pub name: String,
    pub admin_id: UserId,
    pub max_players: i32,
    pub is_open: bool,
    pub status: TournamentStatus,
    pub created_at: DateTime<Utc>,
}

impl TournamentResponse {
    pub fn new(tournament: TournamentModel, round_count: usize) -> Self {
        let status = tournament.status(round_count);
        Self {
            id: tournament.id,
            name: tournament.name,
            admin_id: tournament.admin_id,
            max_players: tournament.max_players,
            is_open: tournament.is_open,
            status,
            created_at: tournament.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantResponse {
    pub user_id: UserId,
    pub username: String,
    pub applied_at: DateTime<Utc>,
    pub losses: i32,
    pub bye_count: i32,
    pub eliminated: bool,
}

impl ParticipantResponse {
    pub fn new(participant: ParticipantModel, eliminated: bool) -> Self {
        Self {
            user_id: participant.user_id,
            username: participant.username,
            applied_at: participant.applied_at,
            losses: participant.losses,
            bye_count: participant.bye_count,
            eliminated,
        }
    }
}

/// The participant sitting out a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByePlayer {
    pub user_id: UserId,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResponse {
    pub id: RoundId,
    pub round_number: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub matches: Vec<MatchDetails>,
}

impl RoundResponse {
    pub fn new(round: RoundModel, matches: Vec<MatchDetails>) -> Self {
        let is_completed = matches.iter().all(|m| m.winner_id.is_some());
        Self {
            id: round.id,
            round_number: round.round_number,
            start_time: round.start_time,
            end_time: round.end_time,
            is_completed,
            matches,
        }
    }

    pub fn bye_player(&self) -> Option<ByePlayer> {
        self.matches
            .iter()
            .find(|m| m.player2_id.is_none())
            .map(|m| ByePlayer {
                user_id: m.player1_id,
                username: m.player1_username.clone(),
            })
    }
}

/// Response for starting or advancing a tournament
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartedRound {
    pub tournament_id: TournamentId,
    pub round: RoundResponse,
    pub bye_player: Option<ByePlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentDetailsResponse {
    pub tournament: TournamentResponse,
    pub participants: Vec<ParticipantResponse>,
    pub rounds: Vec<RoundResponse>,
    /// Bye recipient of round 1, if the opening roster was odd
    pub bye_player: Option<ByePlayer>,
}
