use bracket_server::{
    app, AppConfig, AppState, InMemoryTournamentRepository, PostgresTournamentRepository,
    TournamentRepository, TournamentService,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bracket_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        elimination_threshold = config.elimination_policy.threshold,
        bye_scoring = %config.bye_scoring,
        "Starting bracket server"
    );

    let (repository, pool) = match &config.database {
        Some(database) => {
            let pool = PgPoolOptions::new()
                .max_connections(database.max_connections)
                .acquire_timeout(database.acquire_timeout)
                .connect(&database.database_url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!(max_connections = database.max_connections, "Connected to PostgreSQL");
            let repository: Arc<dyn TournamentRepository> =
                Arc::new(PostgresTournamentRepository::new(pool.clone()));
            (repository, Some(pool))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory storage");
            let repository: Arc<dyn TournamentRepository> =
                Arc::new(InMemoryTournamentRepository::new());
            (repository, None)
        }
    };

    let service = TournamentService::new(repository, config.elimination_policy, config.bye_scoring);
    let app = app(AppState::new(Arc::new(service)));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server running on http://{}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        pool.close().await;
        info!("Database pool closed");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
