use rand::{rngs::StdRng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{
    errors::{TournamentError, TournamentResult},
    leaderboard::{build_leaderboard, ByeScoring, LeaderboardEntry},
    models::{
        MatchDetails, MatchId, MatchModel, NewTournament, NotificationModel, ParticipantModel,
        RankingModel, RoundModel, TournamentId, TournamentModel, UserId,
    },
    pairing::{plan_round, PairingCandidate},
    repository::{ApplyResult, MatchResultWrite, PersistedRound, TournamentRepository},
    roster::EliminationPolicy,
    types::{
        CreateTournamentRequest, ParticipantResponse, RecordRankingRequest, RoundResponse,
        StartedRound, TournamentDetailsResponse, TournamentResponse,
    },
};

/// Service for tournament business logic: lifecycle, pairing, results and standings
pub struct TournamentService {
    repository: Arc<dyn TournamentRepository>,
    policy: EliminationPolicy,
    bye_scoring: ByeScoring,
    rng: Mutex<StdRng>,
}

impl TournamentService {
    pub fn new(
        repository: Arc<dyn TournamentRepository>,
        policy: EliminationPolicy,
        bye_scoring: ByeScoring,
    ) -> Self {
        Self::with_rng(repository, policy, bye_scoring, StdRng::from_os_rng())
    }

    /// Uses the given generator for pairing shuffles; tests pass a seeded one
    pub fn with_rng(
        repository: Arc<dyn TournamentRepository>,
        policy: EliminationPolicy,
        bye_scoring: ByeScoring,
        rng: StdRng,
    ) -> Self {
        Self {
            repository,
            policy,
            bye_scoring,
            rng: Mutex::new(rng),
        }
    }

    #[instrument(skip(self))]
    pub async fn create_tournament(
        &self,
        request: CreateTournamentRequest,
    ) -> TournamentResult<TournamentResponse> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(TournamentError::Validation(
                "Tournament name must not be empty".to_string(),
            ));
        }
        if request.max_players < 1 {
            return Err(TournamentError::Validation(
                "max_players must be at least 1".to_string(),
            ));
        }

        let tournament = self
            .repository
            .create_tournament(&NewTournament {
                name: name.to_string(),
                admin_id: request.admin_id,
                max_players: request.max_players,
            })
            .await?;

        info!(
            tournament_id = tournament.id,
            admin_id = tournament.admin_id,
            max_players = tournament.max_players,
            "Tournament created"
        );

        Ok(TournamentResponse::new(tournament, 0))
    }

    #[instrument(skip(self))]
    pub async fn apply(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
        username: &str,
    ) -> TournamentResult<ParticipantResponse> {
        let username = username.trim();
        if username.is_empty() {
            return Err(TournamentError::Validation(
                "username must not be empty".to_string(),
            ));
        }

        match self
            .repository
            .try_apply(tournament_id, user_id, username)
            .await?
        {
            ApplyResult::Applied(participant) => {
                info!(tournament_id, user_id, "Participant applied");
                Ok(ParticipantResponse::new(participant, false))
            }
            ApplyResult::TournamentNotFound => Err(not_found(tournament_id)),
            ApplyResult::Closed => Err(TournamentError::InvalidState(format!(
                "Tournament {} is not accepting applications",
                tournament_id
            ))),
            ApplyResult::Full => Err(TournamentError::InvalidState(format!(
                "Tournament {} is full",
                tournament_id
            ))),
            ApplyResult::AlreadyApplied => {
                warn!(tournament_id, user_id, "Duplicate application");
                Err(TournamentError::Conflict(format!(
                    "User {} already applied to tournament {}",
                    user_id, tournament_id
                )))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn close_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<TournamentResponse> {
        if !self.repository.set_open(tournament_id, false).await? {
            return Err(not_found(tournament_id));
        }
        info!(tournament_id, "Applications closed");

        let tournament = self.require_tournament(tournament_id).await?;
        let rounds = self.repository.list_rounds(tournament_id).await?;
        Ok(TournamentResponse::new(tournament, rounds.len()))
    }

    /// Closes applications and pairs the full applied list into round 1
    #[instrument(skip(self))]
    pub async fn start_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<StartedRound> {
        self.require_tournament(tournament_id).await?;

        let rounds = self.repository.list_rounds(tournament_id).await?;
        if !rounds.is_empty() {
            return Err(TournamentError::InvalidState(format!(
                "Tournament {} has already started",
                tournament_id
            )));
        }

        let participants = self.repository.list_participants(tournament_id).await?;
        let candidates: Vec<PairingCandidate> =
            participants.iter().map(PairingCandidate::from).collect();

        let mut plan = {
            let mut rng = self.rng.lock().await;
            plan_round(&mut *rng, tournament_id, 1, candidates)?
        };
        plan.close_applications = true;

        let persisted = self.repository.create_round(&plan).await?;
        info!(
            tournament_id,
            pairings = plan.pairings.len(),
            has_bye = plan.bye.is_some(),
            "Tournament started"
        );

        Ok(started_round(tournament_id, persisted, &participants))
    }

    /// Pairs the participants still below the elimination threshold into the next round
    #[instrument(skip(self))]
    pub async fn advance_round(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<StartedRound> {
        self.require_tournament(tournament_id).await?;

        let rounds = self.repository.list_rounds(tournament_id).await?;
        let Some(last) = rounds.last() else {
            return Err(TournamentError::InvalidState(format!(
                "Tournament {} has not started",
                tournament_id
            )));
        };
        let round_number = last.round_number + 1;

        let participants = self.repository.list_participants(tournament_id).await?;
        let eligible = self.policy.eligible_participants(&participants);
        debug!(
            round_number,
            eligible = eligible.len(),
            eliminated = participants.len() - eligible.len(),
            "Building next round"
        );

        let candidates: Vec<PairingCandidate> =
            eligible.iter().map(PairingCandidate::from).collect();
        let plan = {
            let mut rng = self.rng.lock().await;
            plan_round(&mut *rng, tournament_id, round_number, candidates)?
        };

        let persisted = self.repository.create_round(&plan).await?;
        info!(
            tournament_id,
            round_number,
            pairings = plan.pairings.len(),
            has_bye = plan.bye.is_some(),
            "Round advanced"
        );

        Ok(started_round(tournament_id, persisted, &participants))
    }

    #[instrument(skip(self))]
    pub async fn record_match_result(
        &self,
        match_id: MatchId,
        winner_id: UserId,
        score: Option<String>,
    ) -> TournamentResult<MatchDetails> {
        let record = self
            .repository
            .get_match(match_id)
            .await?
            .ok_or_else(|| TournamentError::NotFound(format!("Match {} not found", match_id)))?;

        if !record.has_player(winner_id) {
            return Err(TournamentError::Validation(format!(
                "User {} is not a player in match {}",
                winner_id, match_id
            )));
        }

        let written = match self
            .repository
            .record_match_result(match_id, winner_id, score.as_deref())
            .await?
        {
            MatchResultWrite::Decided(record) => {
                info!(match_id, winner_id, "Match result recorded");
                record
            }
            MatchResultWrite::Converged(record) => {
                debug!(match_id, winner_id, "Match already decided with this winner");
                record
            }
            MatchResultWrite::AlreadyDecided(existing) => {
                warn!(
                    match_id,
                    winner_id,
                    existing_winner = ?existing.winner_id,
                    "Match already decided with a different winner"
                );
                return Err(TournamentError::Conflict(format!(
                    "Match {} already has a different winner",
                    match_id
                )));
            }
            MatchResultWrite::MatchNotFound => {
                return Err(TournamentError::NotFound(format!(
                    "Match {} not found",
                    match_id
                )))
            }
        };

        let rounds = self.repository.list_rounds(written.tournament_id).await?;
        let participants = self
            .repository
            .list_participants(written.tournament_id)
            .await?;
        let usernames = username_map(&participants);
        let round_number = rounds
            .iter()
            .find(|r| r.id == written.round_id)
            .map(|r| r.round_number)
            .unwrap_or_default();

        Ok(MatchDetails::new(&written, round_number, |id| {
            usernames.get(&id).cloned()
        }))
    }

    /// Recomputes standings from the tournament's match history
    #[instrument(skip(self))]
    pub async fn get_leaderboard(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<LeaderboardEntry>> {
        self.require_tournament(tournament_id).await?;

        let matches = self.repository.list_matches(tournament_id).await?;
        let participants = self.repository.list_participants(tournament_id).await?;
        let leaderboard =
            build_leaderboard(&matches, &username_map(&participants), self.bye_scoring);

        debug!(entries = leaderboard.len(), "Leaderboard computed");
        Ok(leaderboard)
    }

    #[instrument(skip(self))]
    pub async fn reset_tournament(&self, tournament_id: TournamentId) -> TournamentResult<()> {
        if !self.repository.reset_tournament(tournament_id).await? {
            return Err(not_found(tournament_id));
        }
        info!(tournament_id, "Tournament reset");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn tournament_details(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<TournamentDetailsResponse> {
        let tournament = self.require_tournament(tournament_id).await?;
        self.details_for(tournament).await
    }

    #[instrument(skip(self))]
    pub async fn latest_tournament(&self) -> TournamentResult<TournamentDetailsResponse> {
        let tournament = self
            .repository
            .latest_tournament()
            .await?
            .ok_or_else(|| TournamentError::NotFound("No tournaments exist".to_string()))?;
        self.details_for(tournament).await
    }

    #[instrument(skip(self))]
    pub async fn list_matches(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<MatchDetails>> {
        self.require_tournament(tournament_id).await?;

        let rounds = self.repository.list_rounds(tournament_id).await?;
        let matches = self.repository.list_matches(tournament_id).await?;
        let participants = self.repository.list_participants(tournament_id).await?;
        let usernames = username_map(&participants);

        let round_numbers: HashMap<i64, i32> =
            rounds.iter().map(|r| (r.id, r.round_number)).collect();

        Ok(matches
            .iter()
            .map(|m| {
                let round_number = round_numbers.get(&m.round_id).copied().unwrap_or_default();
                MatchDetails::new(m, round_number, |id| usernames.get(&id).cloned())
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn notifications_for_user(
        &self,
        user_id: UserId,
    ) -> TournamentResult<Vec<NotificationModel>> {
        self.repository.notifications_for_user(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn record_ranking(
        &self,
        request: RecordRankingRequest,
    ) -> TournamentResult<RankingModel> {
        if request.rank < 1 {
            return Err(TournamentError::Validation(
                "rank must be at least 1".to_string(),
            ));
        }
        self.repository
            .record_ranking(request.user_id, request.tournament_id, request.rank)
            .await
    }

    #[instrument(skip(self))]
    pub async fn rankings_for_user(&self, user_id: UserId) -> TournamentResult<Vec<RankingModel>> {
        self.repository.rankings_for_user(user_id).await
    }

    async fn require_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<TournamentModel> {
        self.repository
            .get_tournament(tournament_id)
            .await?
            .ok_or_else(|| not_found(tournament_id))
    }

    async fn details_for(
        &self,
        tournament: TournamentModel,
    ) -> TournamentResult<TournamentDetailsResponse> {
        let rounds = self.repository.list_rounds(tournament.id).await?;
        let matches = self.repository.list_matches(tournament.id).await?;
        let participants = self.repository.list_participants(tournament.id).await?;
        let usernames = username_map(&participants);

        let rounds: Vec<RoundResponse> = rounds
            .into_iter()
            .map(|round| round_response(round, &matches, &usernames))
            .collect();
        let bye_player = rounds
            .iter()
            .find(|r| r.round_number == 1)
            .and_then(RoundResponse::bye_player);

        let participants = participants
            .into_iter()
            .map(|p| {
                let eliminated = self.policy.is_eliminated(&p);
                ParticipantResponse::new(p, eliminated)
            })
            .collect();

        Ok(TournamentDetailsResponse {
            tournament: TournamentResponse::new(tournament, rounds.len()),
            participants,
            rounds,
            bye_player,
        })
    }
}

fn not_found(tournament_id: TournamentId) -> TournamentError {
    TournamentError::NotFound(format!("Tournament {} not found", tournament_id))
}

fn username_map(participants: &[ParticipantModel]) -> HashMap<UserId, String> {
    participants
        .iter()
        .map(|p| (p.user_id, p.username.clone()))
        .collect()
}

fn round_response(
    round: RoundModel,
    matches: &[MatchModel],
    usernames: &HashMap<UserId, String>,
) -> RoundResponse {
    let details = matches
        .iter()
        .filter(|m| m.round_id == round.id)
        .map(|m| MatchDetails::new(m, round.round_number, |id| usernames.get(&id).cloned()))
        .collect();
    RoundResponse::new(round, details)
}

fn started_round(
    tournament_id: TournamentId,
    persisted: PersistedRound,
    participants: &[ParticipantModel],
) -> StartedRound {
    let usernames = username_map(participants);
    let round = round_response(persisted.round, &persisted.matches, &usernames);
    let bye_player = round.bye_player();
    StartedRound {
        tournament_id,
        round,
        bye_player,
    }
}
