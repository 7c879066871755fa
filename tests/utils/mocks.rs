#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;

use bracket_server::tournament::{
    models::{
        MatchId, MatchModel, NewTournament, NotificationModel, ParticipantModel, RankingModel,
        RoundModel, TournamentId, TournamentModel, UserId,
    },
    repository::{ApplyResult, MatchResultWrite, PersistedRound},
    InMemoryTournamentRepository, RoundPlan, TournamentRepository, TournamentResult,
};

/// Repository whose `list_rounds` keeps answering with an earlier snapshot.
///
/// Lets a test replay the read half of an advance that raced with another one,
/// while every write still lands in the shared in-memory store.
pub struct StaleRoundsRepository {
    inner: Arc<InMemoryTournamentRepository>,
    rounds: Vec<RoundModel>,
}

impl StaleRoundsRepository {
    pub fn new(inner: Arc<InMemoryTournamentRepository>, rounds: Vec<RoundModel>) -> Self {
        Self { inner, rounds }
    }
}

#[async_trait]
impl TournamentRepository for StaleRoundsRepository {
    async fn create_tournament(
        &self,
        tournament: &NewTournament,
    ) -> TournamentResult<TournamentModel> {
        self.inner.create_tournament(tournament).await
    }

    async fn get_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<TournamentModel>> {
        self.inner.get_tournament(tournament_id).await
    }

    async fn latest_tournament(&self) -> TournamentResult<Option<TournamentModel>> {
        self.inner.latest_tournament().await
    }

    async fn set_open(&self, tournament_id: TournamentId, is_open: bool) -> TournamentResult<bool> {
        self.inner.set_open(tournament_id, is_open).await
    }

    async fn try_apply(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
        username: &str,
    ) -> TournamentResult<ApplyResult> {
        self.inner.try_apply(tournament_id, user_id, username).await
    }

    async fn list_participants(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<ParticipantModel>> {
        self.inner.list_participants(tournament_id).await
    }

    async fn list_rounds(&self, tournament_id: TournamentId) -> TournamentResult<Vec<RoundModel>> {
        Ok(self
            .rounds
            .iter()
            .filter(|r| r.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> TournamentResult<Vec<MatchModel>> {
        self.inner.list_matches(tournament_id).await
    }

    async fn get_match(&self, match_id: MatchId) -> TournamentResult<Option<MatchModel>> {
        self.inner.get_match(match_id).await
    }

    async fn create_round(&self, plan: &RoundPlan) -> TournamentResult<PersistedRound> {
        self.inner.create_round(plan).await
    }

    async fn record_match_result(
        &self,
        match_id: MatchId,
        winner_id: UserId,
        score: Option<&str>,
    ) -> TournamentResult<MatchResultWrite> {
        self.inner
            .record_match_result(match_id, winner_id, score)
            .await
    }

    async fn notifications_for_user(
        &self,
        user_id: UserId,
    ) -> TournamentResult<Vec<NotificationModel>> {
        self.inner.notifications_for_user(user_id).await
    }

    async fn reset_tournament(&self, tournament_id: TournamentId) -> TournamentResult<bool> {
        self.inner.reset_tournament(tournament_id).await
    }

    async fn record_ranking(
        &self,
        user_id: UserId,
        tournament_id: TournamentId,
        rank: i32,
    ) -> TournamentResult<RankingModel> {
        self.inner.record_ranking(user_id, tournament_id, rank).await
    }

    async fn rankings_for_user(&self, user_id: UserId) -> TournamentResult<Vec<RankingModel>> {
        self.inner.rankings_for_user(user_id).await
    }
}
