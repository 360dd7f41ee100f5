// ABOUTME: HTTP request handlers for the caller's channel integrations
// ABOUTME: Lists connected providers without secrets and disconnects them

use agentbay_integrations::{ConnectedIntegration, Provider};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::CurrentAccount;
use crate::error::{ApiResult, AppError};
use crate::response::ok;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DisconnectRequest {
    pub provider: Option<String>,
}

pub async fn list_integrations(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> ApiResult<impl IntoResponse> {
    let tokens = state.token_store.list_for_account(&account.id).await?;
    let connected: Vec<ConnectedIntegration> =
        tokens.iter().map(ConnectedIntegration::from).collect();
    Ok(ok(connected))
}

/// Remove the stored credential for one provider. Disconnecting a provider
/// that was never connected succeeds with `removed: false`.
pub async fn disconnect_integration(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    payload: Result<Json<DisconnectRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let provider = request
        .provider
        .as_deref()
        .ok_or_else(|| AppError::validation("provider is required"))?;
    let provider = Provider::from_str(provider)?;

    let removed = state.token_store.delete(&account.id, provider).await?;
    info!(account_id = %account.id, provider = %provider, removed, "Integration disconnected");

    Ok(ok(json!({ "provider": provider, "removed": removed })))
}
