// ABOUTME: HTTP API layer for Agentbay providing REST endpoints and routing
// ABOUTME: Integration layer wiring accounts, agents, credits, usage and integrations

use std::sync::Arc;

use agentbay_agents::AgentManager;
use agentbay_fleet::Reconciler;
use agentbay_integrations::TokenStore;
use agentbay_ledger::LedgerStorage;
use agentbay_storage::AccountStorage;
use agentbay_usage::{MeteringService, UsageLogStorage};
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::SqlitePool;

pub mod agents_handlers;
pub mod auth;
pub mod credits_handlers;
pub mod error;
pub mod health;
pub mod integrations_handlers;
pub mod internal_handlers;
pub mod response;
pub mod usage_handlers;

pub use error::{ApiResult, AppError};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub account_storage: Arc<AccountStorage>,
    pub ledger: LedgerStorage,
    pub agent_manager: Arc<AgentManager>,
    pub reconciler: Arc<Reconciler>,
    pub token_store: Arc<dyn TokenStore>,
    pub usage_log_storage: Arc<UsageLogStorage>,
    pub metering: Arc<MeteringService>,
    internal_secret: Arc<str>,
}

impl AppState {
    /// `internal_secret` guards the service-to-service endpoints, including
    /// the usage callback
    pub fn new(
        pool: SqlitePool,
        reconciler: Arc<Reconciler>,
        token_store: Arc<dyn TokenStore>,
        internal_secret: impl Into<String>,
    ) -> Self {
        let internal_secret: String = internal_secret.into();
        let agent_manager = Arc::new(AgentManager::new(pool.clone(), reconciler.clone()));
        let metering = Arc::new(MeteringService::new(
            pool.clone(),
            internal_secret.clone(),
            agent_manager.clone(),
        ));

        Self {
            account_storage: Arc::new(AccountStorage::new(pool.clone())),
            ledger: LedgerStorage::new(pool.clone()),
            usage_log_storage: Arc::new(UsageLogStorage::new(pool.clone())),
            agent_manager,
            reconciler,
            token_store,
            metering,
            internal_secret: internal_secret.into(),
            pool,
        }
    }

    pub(crate) fn internal_secret(&self) -> &str {
        &self.internal_secret
    }
}

/// Full application router under `/api`
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_check))
        .nest("/api/agents", create_agents_router())
        .nest("/api/credits", create_credits_router())
        .route("/api/billing/recharge", post(credits_handlers::recharge))
        .nest("/api/usage", create_usage_router())
        .nest("/api/integrations", create_integrations_router())
        .nest("/api/internal", create_internal_router())
        .with_state(state)
}

/// Creates the agents API router
pub fn create_agents_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(agents_handlers::list_agents).post(agents_handlers::create_agent),
        )
        .route(
            "/{agent_id}",
            get(agents_handlers::get_agent)
                .patch(agents_handlers::update_agent)
                .delete(agents_handlers::delete_agent),
        )
        .route("/{agent_id}/pause", post(agents_handlers::pause_agent))
        .route("/{agent_id}/resume", post(agents_handlers::resume_agent))
}

/// Creates the credits API router
pub fn create_credits_router() -> Router<AppState> {
    Router::new()
        .route("/", get(credits_handlers::get_credits))
        .route("/settings", put(credits_handlers::update_settings))
}

/// Creates the usage API router
pub fn create_usage_router() -> Router<AppState> {
    Router::new()
        .route("/", get(usage_handlers::list_usage))
        .route("/estimate", post(usage_handlers::estimate))
}

/// Creates the integrations API router
pub fn create_integrations_router() -> Router<AppState> {
    Router::new()
        .route("/", get(integrations_handlers::list_integrations))
        .route(
            "/disconnect",
            post(integrations_handlers::disconnect_integration),
        )
}

/// Service-to-service endpoints, authenticated with the shared bearer secret
pub fn create_internal_router() -> Router<AppState> {
    Router::new()
        .route(
            "/credit-callback",
            post(internal_handlers::credit_callback),
        )
        .route("/accounts", post(internal_handlers::account_signed_in))
        .route(
            "/integrations",
            post(internal_handlers::upsert_integration),
        )
}
