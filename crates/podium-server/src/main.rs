//! Leaderboard server binary for Podium.
//!
//! This is the main entry point that wires together the `PostgreSQL`
//! store, the Redis cache, the ranking engine coordinator, and the Axum
//! HTTP/`WebSocket` API.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `podium-config.yaml`
//! 3. Connect to `PostgreSQL` and run migrations
//! 4. Connect to Redis
//! 5. Assemble the submission coordinator
//! 6. Serve the HTTP API until terminated

mod config;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use podium_api::{AppState, ServerConfig, start_server};
use podium_db::{PgLeaderboardStore, PostgresConfig, PostgresPool, RedisCache};
use podium_engine::Coordinator;

use crate::config::Settings;

/// Default configuration file path, relative to the working directory.
const CONFIG_PATH: &str = "podium-config.yaml";

/// Application entry point for the leaderboard server.
///
/// # Errors
///
/// Returns an error if configuration, database setup, or the HTTP
/// server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("podium-server starting");

    // 2. Load configuration.
    let path = Path::new(CONFIG_PATH);
    let settings = if path.exists() {
        Settings::from_file(path)?
    } else {
        warn!(path = CONFIG_PATH, "Config file not found, using defaults");
        Settings::from_defaults()
    };
    info!(
        host = settings.server.host,
        port = settings.server.port,
        lock_timeout_ms = settings.engine.lock_timeout_ms,
        snapshot_limit = settings.engine.snapshot_limit,
        "Configuration loaded"
    );

    // 3. Connect to PostgreSQL and run migrations.
    let pg_config = PostgresConfig::new(&settings.infrastructure.postgres_url)
        .with_max_connections(settings.infrastructure.max_connections);
    let pool = PostgresPool::connect(&pg_config).await?;
    pool.run_migrations().await?;

    // 4. Connect to Redis. A later outage degrades reads to direct
    // computation; startup still requires the URL to be reachable.
    let cache = RedisCache::connect(&settings.infrastructure.redis_url).await?;

    // 5. Assemble the submission coordinator.
    let store = PgLeaderboardStore::new(&pool);
    let coordinator = Arc::new(Coordinator::new(
        store,
        cache,
        settings.coordinator_config(),
    ));
    info!("Ranking engine assembled");

    // 6. Serve the HTTP API until terminated.
    let server_config = ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
    };
    start_server(&server_config, AppState::new(coordinator)).await?;

    pool.close().await;
    Ok(())
}
