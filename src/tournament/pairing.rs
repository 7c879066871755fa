//! Pairing engine: turns an eligible pool into the matches of one round.
//!
//! The engine is pure. It decides who plays whom and who sits out, and the
//! repository persists the resulting [`RoundPlan`] as a single unit.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{
    errors::{TournamentError, TournamentResult},
    models::{ParticipantModel, TournamentId, UserId},
};

/// A participant as the pairing engine sees them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingCandidate {
    pub user_id: UserId,
    pub username: String,
    pub bye_count: i32,
}

impl From<&ParticipantModel> for PairingCandidate {
    fn from(participant: &ParticipantModel) -> Self {
        Self {
            user_id: participant.user_id,
            username: participant.username.clone(),
            bye_count: participant.bye_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub player1: PairingCandidate,
    pub player2: PairingCandidate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNotification {
    pub user_id: UserId,
    pub message: String,
}

/// Everything a new round consists of, before it is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundPlan {
    pub tournament_id: TournamentId,
    pub round_number: i32,
    pub pairings: Vec<Pairing>,
    pub bye: Option<PairingCandidate>,
    /// Set when writing the round should also stop accepting applications
    pub close_applications: bool,
}

impl RoundPlan {
    /// One notification per bye player and one per side of every pairing
    pub fn notifications(&self) -> Vec<PlannedNotification> {
        let mut notifications = Vec::with_capacity(self.pairings.len() * 2 + 1);

        if let Some(bye) = &self.bye {
            notifications.push(PlannedNotification {
                user_id: bye.user_id,
                message: bye_message(self.round_number),
            });
        }

        for pairing in &self.pairings {
            notifications.push(PlannedNotification {
                user_id: pairing.player1.user_id,
                message: pairing_message(&pairing.player2.username, self.round_number),
            });
            notifications.push(PlannedNotification {
                user_id: pairing.player2.user_id,
                message: pairing_message(&pairing.player1.username, self.round_number),
            });
        }

        notifications
    }

    /// Every user placed in this round, bye player included
    pub fn players(&self) -> Vec<UserId> {
        let mut players: Vec<UserId> = self
            .pairings
            .iter()
            .flat_map(|p| [p.player1.user_id, p.player2.user_id])
            .collect();
        if let Some(bye) = &self.bye {
            players.push(bye.user_id);
        }
        players
    }
}

pub fn pairing_message(opponent: &str, round_number: i32) -> String {
    format!("You are paired against {} in Round {}.", opponent, round_number)
}

pub fn bye_message(round_number: i32) -> String {
    format!(
        "You have a bye in Round {} and advance automatically.",
        round_number
    )
}

/// Shuffles the pool, hands out at most one bye and pairs everyone else.
///
/// With an odd pool the bye goes to a candidate with the fewest byes so far.
/// Ties are settled by the shuffle, so every tied candidate is equally likely.
pub fn plan_round<R: Rng + ?Sized>(
    rng: &mut R,
    tournament_id: TournamentId,
    round_number: i32,
    mut candidates: Vec<PairingCandidate>,
) -> TournamentResult<RoundPlan> {
    if candidates.is_empty() {
        return Err(TournamentError::NoParticipants { tournament_id });
    }

    candidates.shuffle(rng);

    let bye = if candidates.len() % 2 != 0 {
        let index = candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, candidate)| candidate.bye_count)
            .map(|(index, _)| index)
            .unwrap_or(0);
        Some(candidates.remove(index))
    } else {
        None
    };

    let mut pairings = Vec::with_capacity(candidates.len() / 2);
    let mut remaining = candidates.into_iter();
    while let (Some(player1), Some(player2)) = (remaining.next(), remaining.next()) {
        pairings.push(Pairing { player1, player2 });
    }

    Ok(RoundPlan {
        tournament_id,
        round_number,
        pairings,
        bye,
        close_applications: false,
    })
}
