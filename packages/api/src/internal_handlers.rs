// ABOUTME: Service-to-service endpoints
// ABOUTME: Usage metering callback, account sign-in events and connector token upserts

use agentbay_integrations::{ConnectedIntegration, NewIntegrationToken};
use agentbay_usage::UsageReport;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::auth::{bearer_token, InternalCaller};
use crate::error::{ApiResult, AppError};
use crate::response::ok;
use crate::AppState;

/// Cost report for one AI call. The metering service checks the secret
/// itself so that a rejected report never touches the ledger.
pub async fn credit_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UsageReport>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let presented = bearer_token(&headers);
    if presented.is_none() {
        return Err(AppError::Unauthorized);
    }
    let Json(report) = payload?;

    let outcome = state.metering.record_usage(presented, report).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct AccountSignIn {
    pub external_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Identity provider event; creates the account and its empty ledger on first sign-in
pub async fn account_signed_in(
    State(state): State<AppState>,
    _caller: InternalCaller,
    payload: Result<Json<AccountSignIn>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(event) = payload?;
    let external_id = event
        .external_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("external_id is required"))?;

    let account = state
        .account_storage
        .get_or_create(external_id, event.email.as_deref())
        .await?;
    info!(account_id = %account.id, "Account signed in");

    Ok(ok(account))
}

#[derive(Debug, Deserialize)]
pub struct ConnectorToken {
    /// Internal account id, as handed to agent compute
    #[serde(rename = "user_id", alias = "account_id")]
    pub account_id: String,
    #[serde(flatten)]
    pub token: NewIntegrationToken,
}

/// Channel connectors store or refresh the credential for (account, provider)
pub async fn upsert_integration(
    State(state): State<AppState>,
    _caller: InternalCaller,
    payload: Result<Json<ConnectorToken>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(ConnectorToken { account_id, token }) = payload?;
    if token.access_token.trim().is_empty() {
        return Err(AppError::validation("access_token is required"));
    }

    // Unknown accounts are a 404 rather than a foreign key failure
    state.account_storage.get(&account_id).await?;

    let stored = state.token_store.upsert(&account_id, token).await?;
    info!(account_id = %account_id, provider = %stored.provider, "Integration token stored");

    Ok(ok(ConnectedIntegration::from(&stored)))
}
