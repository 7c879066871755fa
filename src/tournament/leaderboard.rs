use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumIter, EnumString};

use super::models::{MatchModel, UserId};

/// How a bye counts towards a player's statistics
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ByeScoring {
    /// The bye player is listed but the bye adds no game and no win
    #[default]
    Neutral,
    /// A bye counts as one game played and one win
    CountedAsWin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub username: Option<String>,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: String,
    pub rank_score: f64,
    pub rank: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    games_played: u32,
    wins: u32,
}

pub fn rank_score(wins: u32, games_played: u32) -> f64 {
    let raw = f64::from(wins) * 3.0 + f64::from(games_played) * 0.5;
    (raw * 10.0).round() / 10.0
}

pub fn win_rate(wins: u32, games_played: u32) -> String {
    if games_played == 0 {
        return "0%".to_string();
    }
    format!("{:.1}%", f64::from(wins) / f64::from(games_played) * 100.0)
}

/// Recomputes standings from the full match history of one tournament.
///
/// Every normal match counts as a game for both sides, decided or not, so
/// `losses` includes games still awaiting a result. Equal scores keep the
/// order in which players first appear.
pub fn build_leaderboard(
    matches: &[MatchModel],
    usernames: &HashMap<UserId, String>,
    bye_scoring: ByeScoring,
) -> Vec<LeaderboardEntry> {
    let mut ordered: Vec<&MatchModel> = matches.iter().collect();
    ordered.sort_by_key(|m| m.id);

    let mut order: Vec<UserId> = Vec::new();
    let mut tallies: HashMap<UserId, Tally> = HashMap::new();

    for record in &ordered {
        let sides: Vec<UserId> = match record.player2_id {
            Some(player2_id) => vec![record.player1_id, player2_id],
            None => vec![record.player1_id],
        };
        let counts_as_game = !record.is_bye() || bye_scoring == ByeScoring::CountedAsWin;

        for user_id in sides {
            let tally = tallies.entry(user_id).or_insert_with(|| {
                order.push(user_id);
                Tally::default()
            });
            if counts_as_game {
                tally.games_played += 1;
                if record.winner_id == Some(user_id) {
                    tally.wins += 1;
                }
            }
        }
    }

    let mut entries: Vec<LeaderboardEntry> = order
        .into_iter()
        .map(|user_id| {
            let tally = tallies.get(&user_id).copied().unwrap_or_default();
            LeaderboardEntry {
                user_id,
                username: usernames.get(&user_id).cloned(),
                games_played: tally.games_played,
                wins: tally.wins,
                losses: tally.games_played - tally.wins,
                win_rate: win_rate(tally.wins, tally.games_played),
                rank_score: rank_score(tally.wins, tally.games_played),
                rank: 0,
            }
        })
        .collect();

    entries.sort_by(|a, b| b.rank_score.total_cmp(&a.rank_score));
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index + 1;
    }

    entries
}
