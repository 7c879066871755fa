use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{
    errors::{TournamentError, TournamentResult},
    models::{
        MatchId, MatchModel, NewTournament, NotificationModel, ParticipantModel, RankingModel,
        RoundId, RoundModel, TournamentId, TournamentModel, UserId,
    },
    pairing::RoundPlan,
};

/// Result of attempting to apply to a tournament
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyResult {
    /// Application recorded, returns the new participant row
    Applied(ParticipantModel),
    TournamentNotFound,
    /// Applications are closed or the tournament has started
    Closed,
    /// Roster already at `max_players`; applications are now closed
    Full,
    AlreadyApplied,
}

/// Result of attempting to write a match winner
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResultWrite {
    /// Winner written and the loser's loss recorded
    Decided(MatchModel),
    /// Match already had this winner; only the score was corrected
    Converged(MatchModel),
    /// Match already had a different winner; nothing was written
    AlreadyDecided(MatchModel),
    MatchNotFound,
}

/// A round and its matches as written
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRound {
    pub round: RoundModel,
    pub matches: Vec<MatchModel>,
}

/// Trait for tournament repository operations
///
/// Every method that writes more than one row does so atomically.
#[async_trait]
pub trait TournamentRepository: Send + Sync {
    async fn create_tournament(&self, tournament: &NewTournament)
        -> TournamentResult<TournamentModel>;
    async fn get_tournament(&self, tournament_id: TournamentId)
        -> TournamentResult<Option<TournamentModel>>;
    /// The tournament with the highest id
    async fn latest_tournament(&self) -> TournamentResult<Option<TournamentModel>>;
    /// Returns false when the tournament does not exist
    async fn set_open(&self, tournament_id: TournamentId, is_open: bool) -> TournamentResult<bool>;

    /// Atomically checks capacity, records the participant and notifies them
    async fn try_apply(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
        username: &str,
    ) -> TournamentResult<ApplyResult>;

    /// Participants in application order
    async fn list_participants(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<ParticipantModel>>;
    /// Rounds in ascending round number
    async fn list_rounds(&self, tournament_id: TournamentId) -> TournamentResult<Vec<RoundModel>>;
    /// Matches in creation order
    async fn list_matches(&self, tournament_id: TournamentId) -> TournamentResult<Vec<MatchModel>>;
    async fn get_match(&self, match_id: MatchId) -> TournamentResult<Option<MatchModel>>;

    /// Writes the round, its matches, the bye increment and all notifications.
    ///
    /// Fails with `Conflict` unless `plan.round_number` is exactly one past the
    /// highest existing round, so two concurrent advances cannot both succeed.
    async fn create_round(&self, plan: &RoundPlan) -> TournamentResult<PersistedRound>;

    /// Conditionally writes the winner and records the loser's loss
    async fn record_match_result(
        &self,
        match_id: MatchId,
        winner_id: UserId,
        score: Option<&str>,
    ) -> TournamentResult<MatchResultWrite>;

    /// Newest first
    async fn notifications_for_user(&self, user_id: UserId)
        -> TournamentResult<Vec<NotificationModel>>;

    /// Deletes the tournament and every row that belongs to it
    async fn reset_tournament(&self, tournament_id: TournamentId) -> TournamentResult<bool>;

    async fn record_ranking(
        &self,
        user_id: UserId,
        tournament_id: TournamentId,
        rank: i32,
    ) -> TournamentResult<RankingModel>;
    /// Ordered by rank
    async fn rankings_for_user(&self, user_id: UserId) -> TournamentResult<Vec<RankingModel>>;
}

#[derive(Debug, Default)]
struct Store {
    tournaments: BTreeMap<TournamentId, TournamentModel>,
    participants: Vec<ParticipantModel>,
    rounds: BTreeMap<RoundId, RoundModel>,
    matches: BTreeMap<MatchId, MatchModel>,
    notifications: Vec<NotificationModel>,
    rankings: Vec<RankingModel>,
    last_tournament_id: i64,
    last_round_id: i64,
    last_match_id: i64,
    last_notification_id: i64,
    last_ranking_id: i64,
}

fn next_id(last: &mut i64) -> i64 {
    *last += 1;
    *last
}

impl Store {
    fn participant_mut(
        &mut self,
        tournament_id: TournamentId,
        user_id: UserId,
    ) -> Option<&mut ParticipantModel> {
        self.participants
            .iter_mut()
            .find(|p| p.tournament_id == tournament_id && p.user_id == user_id)
    }

    fn notify(&mut self, user_id: UserId, tournament_id: TournamentId, message: String) {
        let id = next_id(&mut self.last_notification_id);
        self.notifications.push(NotificationModel {
            id,
            user_id,
            tournament_id,
            message,
            created_at: Utc::now(),
        });
    }

    fn insert_match(
        &mut self,
        tournament_id: TournamentId,
        round_id: RoundId,
        player1_id: UserId,
        player2_id: Option<UserId>,
        winner_id: Option<UserId>,
    ) -> MatchModel {
        let record = MatchModel {
            id: next_id(&mut self.last_match_id),
            tournament_id,
            round_id,
            player1_id,
            player2_id,
            winner_id,
            score: None,
        };
        self.matches.insert(record.id, record.clone());
        record
    }

    fn close_round_if_complete(&mut self, round_id: RoundId) {
        let complete = self
            .matches
            .values()
            .filter(|m| m.round_id == round_id)
            .all(MatchModel::is_decided);
        if let Some(round) = self.rounds.get_mut(&round_id) {
            if complete && round.end_time.is_none() {
                round.end_time = Some(Utc::now());
            }
        }
    }
}

/// In-memory implementation of TournamentRepository for development and testing
///
/// A single lock guards the whole store, which makes every multi-row write
/// atomic and serializes concurrent round creation.
#[derive(Debug, Default)]
pub struct InMemoryTournamentRepository {
    store: Mutex<Store>,
}

impl InMemoryTournamentRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TournamentRepository for InMemoryTournamentRepository {
    #[instrument(skip(self, tournament))]
    async fn create_tournament(
        &self,
        tournament: &NewTournament,
    ) -> TournamentResult<TournamentModel> {
        let mut store = self.store.lock().await;
        let model = TournamentModel {
            id: next_id(&mut store.last_tournament_id),
            name: tournament.name.clone(),
            admin_id: tournament.admin_id,
            max_players: tournament.max_players,
            is_open: true,
            created_at: Utc::now(),
        };
        store.tournaments.insert(model.id, model.clone());

        debug!(tournament_id = model.id, "Tournament created in memory");
        Ok(model)
    }

    async fn get_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<TournamentModel>> {
        let store = self.store.lock().await;
        Ok(store.tournaments.get(&tournament_id).cloned())
    }

    async fn latest_tournament(&self) -> TournamentResult<Option<TournamentModel>> {
        let store = self.store.lock().await;
        Ok(store.tournaments.values().next_back().cloned())
    }

    #[instrument(skip(self))]
    async fn set_open(&self, tournament_id: TournamentId, is_open: bool) -> TournamentResult<bool> {
        let mut store = self.store.lock().await;
        match store.tournaments.get_mut(&tournament_id) {
            Some(tournament) => {
                tournament.is_open = is_open;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip(self))]
    async fn try_apply(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
        username: &str,
    ) -> TournamentResult<ApplyResult> {
        let mut store = self.store.lock().await;

        let Some(tournament) = store.tournaments.get(&tournament_id).cloned() else {
            return Ok(ApplyResult::TournamentNotFound);
        };
        if !tournament.is_open {
            return Ok(ApplyResult::Closed);
        }

        let count = store
            .participants
            .iter()
            .filter(|p| p.tournament_id == tournament_id)
            .count() as i32;

        if count >= tournament.max_players {
            if let Some(t) = store.tournaments.get_mut(&tournament_id) {
                t.is_open = false;
            }
            return Ok(ApplyResult::Full);
        }

        if store.participant_mut(tournament_id, user_id).is_some() {
            return Ok(ApplyResult::AlreadyApplied);
        }

        let participant = ParticipantModel::new(tournament_id, user_id, username.to_string());
        store.participants.push(participant.clone());
        store.notify(
            user_id,
            tournament_id,
            format!("You have applied to participate in {}.", tournament.name),
        );

        if count + 1 >= tournament.max_players {
            info!(tournament_id, "Roster full, closing applications");
            if let Some(t) = store.tournaments.get_mut(&tournament_id) {
                t.is_open = false;
            }
        }

        Ok(ApplyResult::Applied(participant))
    }

    async fn list_participants(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<ParticipantModel>> {
        let store = self.store.lock().await;
        let mut participants: Vec<ParticipantModel> = store
            .participants
            .iter()
            .filter(|p| p.tournament_id == tournament_id)
            .cloned()
            .collect();
        participants.sort_by_key(|p| p.applied_at);
        Ok(participants)
    }

    async fn list_rounds(&self, tournament_id: TournamentId) -> TournamentResult<Vec<RoundModel>> {
        let store = self.store.lock().await;
        let mut rounds: Vec<RoundModel> = store
            .rounds
            .values()
            .filter(|r| r.tournament_id == tournament_id)
            .cloned()
            .collect();
        rounds.sort_by_key(|r| r.round_number);
        Ok(rounds)
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> TournamentResult<Vec<MatchModel>> {
        let store = self.store.lock().await;
        Ok(store
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn get_match(&self, match_id: MatchId) -> TournamentResult<Option<MatchModel>> {
        let store = self.store.lock().await;
        Ok(store.matches.get(&match_id).cloned())
    }

    #[instrument(
        skip(self, plan),
        fields(tournament_id = plan.tournament_id, round_number = plan.round_number)
    )]
    async fn create_round(&self, plan: &RoundPlan) -> TournamentResult<PersistedRound> {
        let mut store = self.store.lock().await;

        if !store.tournaments.contains_key(&plan.tournament_id) {
            return Err(TournamentError::NotFound(format!(
                "Tournament {} not found",
                plan.tournament_id
            )));
        }

        let current = store
            .rounds
            .values()
            .filter(|r| r.tournament_id == plan.tournament_id)
            .map(|r| r.round_number)
            .max()
            .unwrap_or(0);
        if plan.round_number != current + 1 {
            warn!(current, "Round number already taken");
            return Err(TournamentError::Conflict(format!(
                "Round {} cannot follow round {}",
                plan.round_number, current
            )));
        }

        let round = RoundModel {
            id: next_id(&mut store.last_round_id),
            tournament_id: plan.tournament_id,
            round_number: plan.round_number,
            start_time: Utc::now(),
            end_time: None,
        };
        store.rounds.insert(round.id, round.clone());

        let mut matches = Vec::with_capacity(plan.pairings.len() + 1);
        if let Some(bye) = &plan.bye {
            matches.push(store.insert_match(
                plan.tournament_id,
                round.id,
                bye.user_id,
                None,
                Some(bye.user_id),
            ));
            if let Some(participant) = store.participant_mut(plan.tournament_id, bye.user_id) {
                participant.record_bye();
            }
        }
        for pairing in &plan.pairings {
            matches.push(store.insert_match(
                plan.tournament_id,
                round.id,
                pairing.player1.user_id,
                Some(pairing.player2.user_id),
                None,
            ));
        }

        for notification in plan.notifications() {
            store.notify(notification.user_id, plan.tournament_id, notification.message);
        }

        if plan.close_applications {
            if let Some(tournament) = store.tournaments.get_mut(&plan.tournament_id) {
                tournament.is_open = false;
            }
        }

        store.close_round_if_complete(round.id);
        let round = store.rounds.get(&round.id).cloned().unwrap_or(round);

        debug!(match_count = matches.len(), "Round created in memory");
        Ok(PersistedRound { round, matches })
    }

    #[instrument(skip(self))]
    async fn record_match_result(
        &self,
        match_id: MatchId,
        winner_id: UserId,
        score: Option<&str>,
    ) -> TournamentResult<MatchResultWrite> {
        let mut store = self.store.lock().await;

        let Some(record) = store.matches.get_mut(&match_id) else {
            return Ok(MatchResultWrite::MatchNotFound);
        };

        match record.winner_id {
            Some(existing) if existing == winner_id => {
                if let Some(score) = score {
                    record.score = Some(score.to_string());
                }
                Ok(MatchResultWrite::Converged(record.clone()))
            }
            Some(_) => Ok(MatchResultWrite::AlreadyDecided(record.clone())),
            None => {
                record.winner_id = Some(winner_id);
                record.score = score.map(str::to_string);
                let decided = record.clone();

                if let Some(loser_id) = decided.opponent_of(winner_id) {
                    if let Some(participant) =
                        store.participant_mut(decided.tournament_id, loser_id)
                    {
                        participant.record_loss();
                    }
                }
                store.close_round_if_complete(decided.round_id);

                Ok(MatchResultWrite::Decided(decided))
            }
        }
    }

    async fn notifications_for_user(
        &self,
        user_id: UserId,
    ) -> TournamentResult<Vec<NotificationModel>> {
        let store = self.store.lock().await;
        Ok(store
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn reset_tournament(&self, tournament_id: TournamentId) -> TournamentResult<bool> {
        let mut store = self.store.lock().await;
        if store.tournaments.remove(&tournament_id).is_none() {
            return Ok(false);
        }

        store.rankings.retain(|r| r.tournament_id != tournament_id);
        store.notifications.retain(|n| n.tournament_id != tournament_id);
        store.matches.retain(|_, m| m.tournament_id != tournament_id);
        store.rounds.retain(|_, r| r.tournament_id != tournament_id);
        store.participants.retain(|p| p.tournament_id != tournament_id);

        info!(tournament_id, "Tournament reset in memory");
        Ok(true)
    }

    async fn record_ranking(
        &self,
        user_id: UserId,
        tournament_id: TournamentId,
        rank: i32,
    ) -> TournamentResult<RankingModel> {
        let mut store = self.store.lock().await;
        if !store.tournaments.contains_key(&tournament_id) {
            return Err(TournamentError::NotFound(format!(
                "Tournament {} not found",
                tournament_id
            )));
        }
        let ranking = RankingModel {
            id: next_id(&mut store.last_ranking_id),
            user_id,
            tournament_id,
            rank,
        };
        store.rankings.push(ranking.clone());
        Ok(ranking)
    }

    async fn rankings_for_user(&self, user_id: UserId) -> TournamentResult<Vec<RankingModel>> {
        let store = self.store.lock().await;
        let mut rankings: Vec<RankingModel> = store
            .rankings
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rankings.sort_by_key(|r| r.rank);
        Ok(rankings)
    }
}

/// PostgreSQL implementation of tournament repository
///
/// Multi-row writes run inside a transaction; the tournament row is locked
/// with `FOR UPDATE` so concurrent round creation and applications serialize.
pub struct PostgresTournamentRepository {
    pool: PgPool,
}

impl PostgresTournamentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TournamentRepository for PostgresTournamentRepository {
    #[instrument(skip(self, tournament))]
    async fn create_tournament(
        &self,
        tournament: &NewTournament,
    ) -> TournamentResult<TournamentModel> {
        debug!(name = %tournament.name, "Creating tournament in database");

        let model = sqlx::query_as::<_, TournamentModel>(
            "INSERT INTO tournaments (name, admin_id, max_players, is_open) \
             VALUES ($1, $2, $3, TRUE) \
             RETURNING id, name, admin_id, max_players, is_open, created_at",
        )
        .bind(&tournament.name)
        .bind(tournament.admin_id)
        .bind(tournament.max_players)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create tournament in database");
            TournamentError::from(e)
        })?;

        Ok(model)
    }

    async fn get_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<TournamentModel>> {
        let model = sqlx::query_as::<_, TournamentModel>(
            "SELECT id, name, admin_id, max_players, is_open, created_at FROM tournaments \
             WHERE id = $1",
        )
        .bind(tournament_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(model)
    }

    async fn latest_tournament(&self) -> TournamentResult<Option<TournamentModel>> {
        let model = sqlx::query_as::<_, TournamentModel>(
            "SELECT id, name, admin_id, max_players, is_open, created_at FROM tournaments \
             ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(model)
    }

    #[instrument(skip(self))]
    async fn set_open(&self, tournament_id: TournamentId, is_open: bool) -> TournamentResult<bool> {
        let result = sqlx::query("UPDATE tournaments SET is_open = $2 WHERE id = $1")
            .bind(tournament_id)
            .bind(is_open)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn try_apply(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
        username: &str,
    ) -> TournamentResult<ApplyResult> {
        let mut tx = self.pool.begin().await?;

        let tournament = sqlx::query_as::<_, TournamentModel>(
            "SELECT id, name, admin_id, max_players, is_open, created_at FROM tournaments \
             WHERE id = $1 FOR UPDATE",
        )
        .bind(tournament_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(tournament) = tournament else {
            return Ok(ApplyResult::TournamentNotFound);
        };
        if !tournament.is_open {
            return Ok(ApplyResult::Closed);
        }

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM participants WHERE tournament_id = $1")
                .bind(tournament_id)
                .fetch_one(&mut *tx)
                .await?;

        if count >= i64::from(tournament.max_players) {
            sqlx::query("UPDATE tournaments SET is_open = FALSE WHERE id = $1")
                .bind(tournament_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(ApplyResult::Full);
        }

        let existing = sqlx::query(
            "SELECT user_id FROM participants WHERE tournament_id = $1 AND user_id = $2",
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            return Ok(ApplyResult::AlreadyApplied);
        }

        let participant = sqlx::query_as::<_, ParticipantModel>(
            "INSERT INTO participants (tournament_id, user_id, username) VALUES ($1, $2, $3) \
             RETURNING tournament_id, user_id, username, applied_at, losses, bye_count",
        )
        .bind(tournament_id)
        .bind(user_id)
        .bind(username)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO notifications (user_id, tournament_id, message) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(tournament_id)
        .bind(format!(
            "You have applied to participate in {}.",
            tournament.name
        ))
        .execute(&mut *tx)
        .await?;

        if count + 1 >= i64::from(tournament.max_players) {
            info!(tournament_id, "Roster full, closing applications");
            sqlx::query("UPDATE tournaments SET is_open = FALSE WHERE id = $1")
                .bind(tournament_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(ApplyResult::Applied(participant))
    }

    async fn list_participants(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<ParticipantModel>> {
        let participants = sqlx::query_as::<_, ParticipantModel>(
            "SELECT tournament_id, user_id, username, applied_at, losses, bye_count \
             FROM participants WHERE tournament_id = $1 ORDER BY applied_at ASC",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(participants)
    }

    async fn list_rounds(&self, tournament_id: TournamentId) -> TournamentResult<Vec<RoundModel>> {
        let rounds = sqlx::query_as::<_, RoundModel>(
            "SELECT id, tournament_id, round_number, start_time, end_time \
             FROM rounds WHERE tournament_id = $1 ORDER BY round_number ASC",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rounds)
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> TournamentResult<Vec<MatchModel>> {
        let matches = sqlx::query_as::<_, MatchModel>(
            "SELECT id, tournament_id, round_id, player1_id, player2_id, winner_id, score \
             FROM matches WHERE tournament_id = $1 ORDER BY id ASC",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(matches)
    }

    async fn get_match(&self, match_id: MatchId) -> TournamentResult<Option<MatchModel>> {
        let record = sqlx::query_as::<_, MatchModel>(
            "SELECT id, tournament_id, round_id, player1_id, player2_id, winner_id, score \
             FROM matches WHERE id = $1",
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    #[instrument(
        skip(self, plan),
        fields(tournament_id = plan.tournament_id, round_number = plan.round_number)
    )]
    async fn create_round(&self, plan: &RoundPlan) -> TournamentResult<PersistedRound> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query("SELECT id FROM tournaments WHERE id = $1 FOR UPDATE")
            .bind(plan.tournament_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(TournamentError::NotFound(format!(
                "Tournament {} not found",
                plan.tournament_id
            )));
        }

        let current: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(round_number), 0) FROM rounds WHERE tournament_id = $1",
        )
        .bind(plan.tournament_id)
        .fetch_one(&mut *tx)
        .await?;
        if plan.round_number != current + 1 {
            warn!(current, "Round number already taken");
            return Err(TournamentError::Conflict(format!(
                "Round {} cannot follow round {}",
                plan.round_number, current
            )));
        }

        let mut round = sqlx::query_as::<_, RoundModel>(
            "INSERT INTO rounds (tournament_id, round_number, start_time) VALUES ($1, $2, NOW()) \
             RETURNING id, tournament_id, round_number, start_time, end_time",
        )
        .bind(plan.tournament_id)
        .bind(plan.round_number)
        .fetch_one(&mut *tx)
        .await?;

        let mut matches = Vec::with_capacity(plan.pairings.len() + 1);
        if let Some(bye) = &plan.bye {
            let record = sqlx::query_as::<_, MatchModel>(
                "INSERT INTO matches (tournament_id, round_id, player1_id, winner_id) \
                 VALUES ($1, $2, $3, $3) \
                 RETURNING id, tournament_id, round_id, player1_id, player2_id, winner_id, score",
            )
            .bind(plan.tournament_id)
            .bind(round.id)
            .bind(bye.user_id)
            .fetch_one(&mut *tx)
            .await?;
            matches.push(record);

            sqlx::query(
                "UPDATE participants SET bye_count = bye_count + 1 \
                 WHERE tournament_id = $1 AND user_id = $2",
            )
            .bind(plan.tournament_id)
            .bind(bye.user_id)
            .execute(&mut *tx)
            .await?;
        }

        for pairing in &plan.pairings {
            let record = sqlx::query_as::<_, MatchModel>(
                "INSERT INTO matches (tournament_id, round_id, player1_id, player2_id) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, tournament_id, round_id, player1_id, player2_id, winner_id, score",
            )
            .bind(plan.tournament_id)
            .bind(round.id)
            .bind(pairing.player1.user_id)
            .bind(pairing.player2.user_id)
            .fetch_one(&mut *tx)
            .await?;
            matches.push(record);
        }

        for notification in plan.notifications() {
            sqlx::query(
                "INSERT INTO notifications (user_id, tournament_id, message) VALUES ($1, $2, $3)",
            )
            .bind(notification.user_id)
            .bind(plan.tournament_id)
            .bind(&notification.message)
            .execute(&mut *tx)
            .await?;
        }

        if plan.close_applications {
            sqlx::query("UPDATE tournaments SET is_open = FALSE WHERE id = $1")
                .bind(plan.tournament_id)
                .execute(&mut *tx)
                .await?;
        }

        if plan.pairings.is_empty() {
            // A bye-only round is complete the moment it exists
            round = sqlx::query_as::<_, RoundModel>(
                "UPDATE rounds SET end_time = NOW() WHERE id = $1 \
                 RETURNING id, tournament_id, round_number, start_time, end_time",
            )
            .bind(round.id)
            .fetch_one(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(match_count = matches.len(), "Round created in database");
        Ok(PersistedRound { round, matches })
    }

    #[instrument(skip(self))]
    async fn record_match_result(
        &self,
        match_id: MatchId,
        winner_id: UserId,
        score: Option<&str>,
    ) -> TournamentResult<MatchResultWrite> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, MatchModel>(
            "SELECT id, tournament_id, round_id, player1_id, player2_id, winner_id, score \
             FROM matches WHERE id = $1 FOR UPDATE",
        )
        .bind(match_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            return Ok(MatchResultWrite::MatchNotFound);
        };

        match current.winner_id {
            Some(existing) if existing == winner_id => {
                let updated = sqlx::query_as::<_, MatchModel>(
                    "UPDATE matches SET score = COALESCE($2, score) WHERE id = $1 \
                     RETURNING id, tournament_id, round_id, player1_id, player2_id, \
                     winner_id, score",
                )
                .bind(match_id)
                .bind(score)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok(MatchResultWrite::Converged(updated))
            }
            Some(_) => Ok(MatchResultWrite::AlreadyDecided(current)),
            None => {
                let decided = sqlx::query_as::<_, MatchModel>(
                    "UPDATE matches SET winner_id = $2, score = $3 \
                     WHERE id = $1 AND winner_id IS NULL \
                     RETURNING id, tournament_id, round_id, player1_id, player2_id, \
                     winner_id, score",
                )
                .bind(match_id)
                .bind(winner_id)
                .bind(score)
                .fetch_one(&mut *tx)
                .await?;

                if let Some(loser_id) = decided.opponent_of(winner_id) {
                    sqlx::query(
                        "UPDATE participants SET losses = losses + 1 \
                         WHERE tournament_id = $1 AND user_id = $2",
                    )
                    .bind(decided.tournament_id)
                    .bind(loser_id)
                    .execute(&mut *tx)
                    .await?;
                }

                sqlx::query(
                    "UPDATE rounds SET end_time = NOW() WHERE id = $1 AND end_time IS NULL \
                     AND NOT EXISTS \
                     (SELECT 1 FROM matches WHERE round_id = $1 AND winner_id IS NULL)",
                )
                .bind(decided.round_id)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(MatchResultWrite::Decided(decided))
            }
        }
    }

    async fn notifications_for_user(
        &self,
        user_id: UserId,
    ) -> TournamentResult<Vec<NotificationModel>> {
        let notifications = sqlx::query_as::<_, NotificationModel>(
            "SELECT id, user_id, tournament_id, message, created_at FROM notifications \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    #[instrument(skip(self))]
    async fn reset_tournament(&self, tournament_id: TournamentId) -> TournamentResult<bool> {
        let mut tx = self.pool.begin().await?;

        for statement in [
            "DELETE FROM rankings WHERE tournament_id = $1",
            "DELETE FROM notifications WHERE tournament_id = $1",
            "DELETE FROM matches WHERE tournament_id = $1",
            "DELETE FROM rounds WHERE tournament_id = $1",
            "DELETE FROM participants WHERE tournament_id = $1",
        ] {
            sqlx::query(statement)
                .bind(tournament_id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM tournaments WHERE id = $1")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(tournament_id, "Tournament reset in database");
        Ok(result.rows_affected() > 0)
    }

    async fn record_ranking(
        &self,
        user_id: UserId,
        tournament_id: TournamentId,
        rank: i32,
    ) -> TournamentResult<RankingModel> {
        let ranking = sqlx::query_as::<_, RankingModel>(
            "INSERT INTO rankings (user_id, tournament_id, rank) VALUES ($1, $2, $3) \
             RETURNING id, user_id, tournament_id, rank",
        )
        .bind(user_id)
        .bind(tournament_id)
        .bind(rank)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let missing_tournament =
                matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation());
            if missing_tournament {
                TournamentError::NotFound(format!("Tournament {} not found", tournament_id))
            } else {
                warn!(error = %e, "Failed to record ranking");
                TournamentError::from(e)
            }
        })?;
        Ok(ranking)
    }

    async fn rankings_for_user(&self, user_id: UserId) -> TournamentResult<Vec<RankingModel>> {
        let rankings = sqlx::query_as::<_, RankingModel>(
            "SELECT id, user_id, tournament_id, rank FROM rankings \
             WHERE user_id = $1 ORDER BY rank",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rankings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::pairing::{Pairing, PairingCandidate};

    /// Test helper functions for creating test data
    mod helpers {
        use super::*;

        pub fn new_tournament(max_players: i32) -> NewTournament {
            NewTournament {
                name: "Test Cup".to_string(),
                admin_id: 1,
                max_players,
            }
        }

        pub fn candidate(user_id: i64) -> PairingCandidate {
            PairingCandidate {
                user_id,
                username: format!("user-{}", user_id),
                bye_count: 0,
            }
        }

        pub fn plan(
            tournament_id: i64,
            round_number: i32,
            pairs: &[(i64, i64)],
            bye: Option<i64>,
        ) -> RoundPlan {
            RoundPlan {
                tournament_id,
                round_number,
                pairings: pairs
                    .iter()
                    .map(|(a, b)| Pairing {
                        player1: candidate(*a),
                        player2: candidate(*b),
                    })
                    .collect(),
                bye: bye.map(candidate),
                close_applications: round_number == 1,
            }
        }

        pub async fn tournament_with_players(
            repo: &InMemoryTournamentRepository,
            players: &[i64],
        ) -> TournamentModel {
            let tournament = repo
                .create_tournament(&new_tournament(players.len() as i32 + 1))
                .await
                .unwrap();
            for id in players {
                repo.try_apply(tournament.id, *id, &format!("user-{}", id))
                    .await
                    .unwrap();
            }
            tournament
        }
    }

    use helpers::*;

    #[tokio::test]
    async fn test_create_and_get_tournament() {
        let repo = InMemoryTournamentRepository::new();
        let created = repo.create_tournament(&new_tournament(8)).await.unwrap();

        let retrieved = repo.get_tournament(created.id).await.unwrap().unwrap();
        assert_eq!(retrieved, created);
        assert!(retrieved.is_open);
        assert!(repo.get_tournament(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_tournament_is_highest_id() {
        let repo = InMemoryTournamentRepository::new();
        assert!(repo.latest_tournament().await.unwrap().is_none());

        repo.create_tournament(&new_tournament(4)).await.unwrap();
        let second = repo.create_tournament(&new_tournament(4)).await.unwrap();

        let latest = repo.latest_tournament().await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test]
    async fn test_apply_closes_when_full() {
        let repo = InMemoryTournamentRepository::new();
        let tournament = repo.create_tournament(&new_tournament(2)).await.unwrap();

        let first = repo.try_apply(tournament.id, 10, "alice").await.unwrap();
        assert!(matches!(first, ApplyResult::Applied(_)));
        let second = repo.try_apply(tournament.id, 20, "bob").await.unwrap();
        assert!(matches!(second, ApplyResult::Applied(_)));

        let stored = repo.get_tournament(tournament.id).await.unwrap().unwrap();
        assert!(!stored.is_open);

        let third = repo.try_apply(tournament.id, 30, "carol").await.unwrap();
        assert_eq!(third, ApplyResult::Closed);
    }

    #[tokio::test]
    async fn test_apply_rejects_duplicates_and_unknown() {
        let repo = InMemoryTournamentRepository::new();
        let tournament = repo.create_tournament(&new_tournament(4)).await.unwrap();

        repo.try_apply(tournament.id, 10, "alice").await.unwrap();
        let again = repo.try_apply(tournament.id, 10, "alice").await.unwrap();
        assert_eq!(again, ApplyResult::AlreadyApplied);

        let missing = repo.try_apply(999, 10, "alice").await.unwrap();
        assert_eq!(missing, ApplyResult::TournamentNotFound);

        let notes = repo.notifications_for_user(10).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "You have applied to participate in Test Cup.");
    }

    #[tokio::test]
    async fn test_create_round_writes_everything() {
        let repo = InMemoryTournamentRepository::new();
        let tournament = tournament_with_players(&repo, &[1, 2, 3]).await;

        let persisted = repo
            .create_round(&plan(tournament.id, 1, &[(1, 2)], Some(3)))
            .await
            .unwrap();

        assert_eq!(persisted.round.round_number, 1);
        assert_eq!(persisted.matches.len(), 2);
        let bye = persisted.matches.iter().find(|m| m.is_bye()).unwrap();
        assert_eq!(bye.player1_id, 3);
        assert_eq!(bye.winner_id, Some(3));

        let participants = repo.list_participants(tournament.id).await.unwrap();
        let bye_player = participants.iter().find(|p| p.user_id == 3).unwrap();
        assert_eq!(bye_player.bye_count, 1);

        let stored = repo.get_tournament(tournament.id).await.unwrap().unwrap();
        assert!(!stored.is_open);

        // One application notice each, plus one pairing or bye notice each
        for user_id in [1, 2, 3] {
            assert_eq!(repo.notifications_for_user(user_id).await.unwrap().len(), 2);
        }
    }

    #[tokio::test]
    async fn test_create_round_rejects_taken_number() {
        let repo = InMemoryTournamentRepository::new();
        let tournament = tournament_with_players(&repo, &[1, 2]).await;

        repo.create_round(&plan(tournament.id, 1, &[(1, 2)], None))
            .await
            .unwrap();
        let duplicate = repo
            .create_round(&plan(tournament.id, 1, &[(1, 2)], None))
            .await;
        assert!(matches!(duplicate, Err(TournamentError::Conflict(_))));

        let skipped = repo
            .create_round(&plan(tournament.id, 3, &[(1, 2)], None))
            .await;
        assert!(matches!(skipped, Err(TournamentError::Conflict(_))));

        assert_eq!(repo.list_rounds(tournament.id).await.unwrap().len(), 1);
        assert_eq!(repo.list_matches(tournament.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_match_result_outcomes() {
        let repo = InMemoryTournamentRepository::new();
        let tournament = tournament_with_players(&repo, &[1, 2]).await;
        let persisted = repo
            .create_round(&plan(tournament.id, 1, &[(1, 2)], None))
            .await
            .unwrap();
        let match_id = persisted.matches[0].id;

        let first = repo
            .record_match_result(match_id, 1, Some("2-0"))
            .await
            .unwrap();
        assert!(matches!(first, MatchResultWrite::Decided(ref m) if m.winner_id == Some(1)));

        let same = repo
            .record_match_result(match_id, 1, Some("2-1"))
            .await
            .unwrap();
        assert!(matches!(
            same,
            MatchResultWrite::Converged(ref m) if m.score.as_deref() == Some("2-1")
        ));

        let other = repo.record_match_result(match_id, 2, None).await.unwrap();
        assert!(matches!(other, MatchResultWrite::AlreadyDecided(_)));

        let missing = repo.record_match_result(999, 1, None).await.unwrap();
        assert_eq!(missing, MatchResultWrite::MatchNotFound);

        // Only the first write counts a loss
        let participants = repo.list_participants(tournament.id).await.unwrap();
        let loser = participants.iter().find(|p| p.user_id == 2).unwrap();
        assert_eq!(loser.losses, 1);

        let rounds = repo.list_rounds(tournament.id).await.unwrap();
        assert!(rounds[0].end_time.is_some());
    }

    #[tokio::test]
    async fn test_reset_removes_all_rows() {
        let repo = InMemoryTournamentRepository::new();
        let tournament = tournament_with_players(&repo, &[1, 2]).await;
        repo.create_round(&plan(tournament.id, 1, &[(1, 2)], None))
            .await
            .unwrap();
        repo.record_ranking(1, tournament.id, 1).await.unwrap();

        assert!(repo.reset_tournament(tournament.id).await.unwrap());

        assert!(repo.get_tournament(tournament.id).await.unwrap().is_none());
        assert!(repo.list_participants(tournament.id).await.unwrap().is_empty());
        assert!(repo.list_rounds(tournament.id).await.unwrap().is_empty());
        assert!(repo.list_matches(tournament.id).await.unwrap().is_empty());
        assert!(repo.notifications_for_user(1).await.unwrap().is_empty());
        assert!(repo.rankings_for_user(1).await.unwrap().is_empty());

        assert!(!repo.reset_tournament(tournament.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_rankings_ordered_by_rank() {
        let repo = InMemoryTournamentRepository::new();
        let first = repo.create_tournament(&new_tournament(4)).await.unwrap();
        let second = repo.create_tournament(&new_tournament(4)).await.unwrap();

        repo.record_ranking(5, first.id, 3).await.unwrap();
        repo.record_ranking(5, second.id, 1).await.unwrap();

        let ranks: Vec<i32> = repo
            .rankings_for_user(5)
            .await
            .unwrap()
            .iter()
            .map(|r| r.rank)
            .collect();
        assert_eq!(ranks, vec![1, 3]);

        let missing = repo.record_ranking(5, 999, 1).await;
        assert!(matches!(missing, Err(TournamentError::NotFound(_))));
    }
}
