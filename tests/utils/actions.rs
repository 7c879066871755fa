//! Test actions - helpers that drive the service through a round
#![allow(dead_code)] // Test utilities may not all be used in every test

use bracket_server::tournament::{
    models::{MatchDetails, UserId},
    types::RoundResponse,
};

use super::setup::TestSetup;

/// Enters a result for every undecided match of the round
pub async fn decide_round(
    setup: &TestSetup,
    round: &RoundResponse,
    pick_winner: impl Fn(&MatchDetails) -> UserId,
) {
    for record in round.matches.iter().filter(|m| m.winner_id.is_none()) {
        setup
            .service
            .record_match_result(record.id, pick_winner(record), None)
            .await
            .unwrap();
    }
}

pub fn first_player_wins(record: &MatchDetails) -> UserId {
    record.player1_id
}

/// Makes `user_id` lose whenever they play; otherwise player 1 wins
pub fn loses(user_id: UserId) -> impl Fn(&MatchDetails) -> UserId {
    move |record| {
        if record.player1_id == user_id {
            record.player2_id.unwrap_or(record.player1_id)
        } else {
            record.player1_id
        }
    }
}
