use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{Display, EnumString};

pub type TournamentId = i64;
pub type UserId = i64;
pub type RoundId = i64;
pub type MatchId = i64;

/// Database model for tournaments table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct TournamentModel {
    pub id: TournamentId,
    pub name: String,
    pub admin_id: UserId,
    pub max_players: i32,
    pub is_open: bool, // Accepting applications
    pub created_at: DateTime<Utc>,
}

/// Lifecycle stage, derived from `is_open` and whether any round exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TournamentStatus {
    Open,
    Closed,
    InProgress,
}

impl TournamentModel {
    pub fn status(&self, round_count: usize) -> TournamentStatus {
        if round_count > 0 {
            TournamentStatus::InProgress
        } else if self.is_open {
            TournamentStatus::Open
        } else {
            TournamentStatus::Closed
        }
    }
}

/// Database model for participants table, unique per (tournament, user)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct ParticipantModel {
    pub tournament_id: TournamentId,
    pub user_id: UserId,
    pub username: String, // Display name captured when applying
    pub applied_at: DateTime<Utc>,
    pub losses: i32,
    pub bye_count: i32,
}

impl ParticipantModel {
    pub fn new(tournament_id: TournamentId, user_id: UserId, username: String) -> Self {
        Self {
            tournament_id,
            user_id,
            username,
            applied_at: Utc::now(),
            losses: 0,
            bye_count: 0,
        }
    }

    /// Called once per decided normal match this participant lost
    pub fn record_loss(&mut self) {
        self.losses += 1;
    }

    /// Called once per round in which this participant received the bye
    pub fn record_bye(&mut self) {
        self.bye_count += 1;
    }
}

/// Database model for rounds table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct RoundModel {
    pub id: RoundId,
    pub tournament_id: TournamentId,
    pub round_number: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Database model for matches table
///
/// `player2_id == None` marks a bye; a bye is created already won by `player1_id`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct MatchModel {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub round_id: RoundId,
    pub player1_id: UserId,
    pub player2_id: Option<UserId>,
    pub winner_id: Option<UserId>,
    pub score: Option<String>,
}

impl MatchModel {
    pub fn is_bye(&self) -> bool {
        self.player2_id.is_none()
    }

    pub fn is_decided(&self) -> bool {
        self.winner_id.is_some()
    }

    pub fn has_player(&self, user_id: UserId) -> bool {
        self.player1_id == user_id || self.player2_id == Some(user_id)
    }

    /// The other side of a normal match, `None` for byes or non-players
    pub fn opponent_of(&self, user_id: UserId) -> Option<UserId> {
        if self.player1_id == user_id {
            self.player2_id
        } else if self.player2_id == Some(user_id) {
            Some(self.player1_id)
        } else {
            None
        }
    }
}

/// Match joined with its round number and the players' display names
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchDetails {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub round_id: RoundId,
    pub round_number: i32,
    pub player1_id: UserId,
    pub player1_username: Option<String>,
    pub player2_id: Option<UserId>,
    pub player2_username: Option<String>,
    pub winner_id: Option<UserId>,
    pub winner_username: Option<String>,
    pub score: Option<String>,
}

impl MatchDetails {
    pub fn new(
        record: &MatchModel,
        round_number: i32,
        username_of: impl Fn(UserId) -> Option<String>,
    ) -> Self {
        Self {
            id: record.id,
            tournament_id: record.tournament_id,
            round_id: record.round_id,
            round_number,
            player1_id: record.player1_id,
            player1_username: username_of(record.player1_id),
            player2_id: record.player2_id,
            player2_username: record.player2_id.and_then(&username_of),
            winner_id: record.winner_id,
            winner_username: record.winner_id.and_then(&username_of),
            score: record.score.clone(),
        }
    }
}

/// Database model for notifications table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct NotificationModel {
    pub id: i64,
    pub user_id: UserId,
    pub tournament_id: TournamentId,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Legacy persisted ranking, superseded by the computed leaderboard
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct RankingModel {
    pub id: i64,
    pub user_id: UserId,
    pub tournament_id: TournamentId,
    pub rank: i32,
}

/// Tournament creation input
#[derive(Debug, Clone)]
pub struct NewTournament {
    pub name: String,
    pub admin_id: UserId,
    pub max_players: i32,
}
