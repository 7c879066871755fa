use serde::{Deserialize, Serialize};

use super::models::ParticipantModel;

/// Losses at which a participant drops out of future pairings
pub const ELIMINATION_THRESHOLD: i32 = 3;

/// Decides which participants are still in contention.
///
/// Eliminated participants keep their rows and history; they are only
/// left out of the pool handed to the pairing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EliminationPolicy {
    pub threshold: i32,
}

impl Default for EliminationPolicy {
    fn default() -> Self {
        Self {
            threshold: ELIMINATION_THRESHOLD,
        }
    }
}

impl EliminationPolicy {
    pub fn new(threshold: i32) -> Self {
        Self { threshold }
    }

    pub fn is_eliminated(&self, participant: &ParticipantModel) -> bool {
        participant.losses >= self.threshold
    }

    pub fn eligible_participants(
        &self,
        participants: &[ParticipantModel],
    ) -> Vec<ParticipantModel> {
        participants
            .iter()
            .filter(|p| !self.is_eliminated(p))
            .cloned()
            .collect()
    }
}
