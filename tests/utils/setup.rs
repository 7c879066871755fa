#![allow(dead_code)] // Test utilities may not all be used in every test

use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;

use bracket_server::{
    tournament::{
        models::{TournamentId, UserId},
        types::CreateTournamentRequest,
        ByeScoring, EliminationPolicy, InMemoryTournamentRepository,
    },
    AppState, TournamentService,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub service: Arc<TournamentService>,
    pub repository: Arc<InMemoryTournamentRepository>,
    pub tournament_id: TournamentId,
    /// (user id, username) in application order
    pub players: Vec<(UserId, String)>,
}

impl TestSetup {
    pub fn user_id(&self, username: &str) -> UserId {
        self.players
            .iter()
            .find(|(_, name)| name == username)
            .map(|(id, _)| *id)
            .unwrap_or_else(|| panic!("no player named {}", username))
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(Arc::clone(&self.service))
    }
}

pub struct TestSetupBuilder {
    players: Vec<String>,
    max_players: Option<i32>,
    policy: EliminationPolicy,
    bye_scoring: ByeScoring,
    seed: u64,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            players: vec![],
            max_players: None,
            policy: EliminationPolicy::default(),
            bye_scoring: ByeScoring::Neutral,
            seed: 42,
        }
    }

    pub fn with_players(mut self, players: Vec<&str>) -> Self {
        self.players = players.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_three_players(self) -> Self {
        self.with_players(vec!["alice", "bob", "charlie"])
    }

    pub fn with_four_players(self) -> Self {
        self.with_players(vec!["alice", "bob", "charlie", "david"])
    }

    pub fn with_max_players(mut self, max_players: i32) -> Self {
        self.max_players = Some(max_players);
        self
    }

    pub fn with_elimination_threshold(mut self, threshold: i32) -> Self {
        self.policy = EliminationPolicy::new(threshold);
        self
    }

    pub fn with_bye_scoring(mut self, bye_scoring: ByeScoring) -> Self {
        self.bye_scoring = bye_scoring;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Service without any tournament, for tests that drive creation themselves
    pub fn build_service(&self) -> (Arc<TournamentService>, Arc<InMemoryTournamentRepository>) {
        let repository = Arc::new(InMemoryTournamentRepository::new());
        let service = Arc::new(TournamentService::with_rng(
            repository.clone(),
            self.policy,
            self.bye_scoring,
            StdRng::seed_from_u64(self.seed),
        ));
        (service, repository)
    }

    pub fn build_app_state(self) -> AppState {
        let (service, _) = self.build_service();
        AppState::new(service)
    }

    /// Creates the tournament and applies every player, in order
    pub async fn build(self) -> TestSetup {
        let (service, repository) = self.build_service();

        let max_players = self
            .max_players
            .unwrap_or_else(|| (self.players.len() as i32).max(1) + 4);
        let tournament = service
            .create_tournament(CreateTournamentRequest {
                admin_id: 9000,
                name: "Integration Cup".to_string(),
                max_players,
            })
            .await
            .unwrap();

        let mut players = Vec::with_capacity(self.players.len());
        for (index, username) in self.players.iter().enumerate() {
            let user_id = index as UserId + 1;
            service
                .apply(tournament.id, user_id, username)
                .await
                .unwrap();
            players.push((user_id, username.clone()));
        }

        TestSetup {
            service,
            repository,
            tournament_id: tournament.id,
            players,
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}
