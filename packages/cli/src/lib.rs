// ABOUTME: Server bootstrap for the agentbay binary
// ABOUTME: Wires configuration, database, fleet client and HTTP router together

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use agentbay_api::{create_router, AppState};
use agentbay_fleet::{HttpOrchestrator, OrchestratorConfig, Reconciler};
use agentbay_integrations::SqliteTokenStore;
use agentbay_storage::{init_pool, MIGRATOR};
use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub mod config;

pub use config::{Config, ConfigError};

/// Linear backoff unit between deprovision retries
const DEPROVISION_BACKOFF: Duration = Duration::from_millis(250);

/// Build the full application from configuration
pub async fn build_app(config: &Config) -> anyhow::Result<Router> {
    ensure_database_dir(&config.database_url)?;
    let pool = init_pool(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_url))?;

    let orchestrator = HttpOrchestrator::new(OrchestratorConfig {
        base_url: config.orchestrator_url.clone(),
        secret: config.orchestrator_secret.clone(),
        timeout: config.orchestrator_timeout,
    })
    .context("Failed to create fleet manager client")?;

    let token_store = Arc::new(SqliteTokenStore::new(pool.clone()));
    let reconciler = Reconciler::new(Arc::new(orchestrator), token_store.clone())
        .with_deprovision_retries(config.deprovision_retries, DEPROVISION_BACKOFF);

    let state = AppState::new(
        pool,
        Arc::new(reconciler),
        token_store,
        config.internal_secret.clone(),
    );

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS_ORIGIN {}", config.cors_origin))?,
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any);

    Ok(create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let app = build_app(&config).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Agentbay API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Apply pending migrations and exit
pub async fn run_migrations(database_url: &str) -> anyhow::Result<()> {
    ensure_database_dir(database_url)?;
    let pool = init_pool(database_url)
        .await
        .with_context(|| format!("Failed to migrate database at {database_url}"))?;
    info!(
        migrations = MIGRATOR.iter().count(),
        "Database schema up to date"
    );
    pool.close().await;
    Ok(())
}

/// SQLite creates the file but not its parent directory
fn ensure_database_dir(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = database_url
        .strip_prefix("sqlite://")
        .map(|rest| rest.split('?').next().unwrap_or(rest))
        .filter(|path| !path.is_empty() && !path.starts_with(":memory:"))
    else {
        return Ok(());
    };

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
