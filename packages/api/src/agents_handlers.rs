// ABOUTME: HTTP request handlers for agent lifecycle operations
// ABOUTME: Create, read, update, pause, resume and delete agents owned by the caller

use agentbay_agents::{CreateAgentRequest, UpdateAgentRequest};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

use crate::auth::CurrentAccount;
use crate::error::ApiResult;
use crate::response::ok;
use crate::AppState;

/// List the caller's agents, newest first
pub async fn list_agents(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> ApiResult<impl IntoResponse> {
    let agents = state.agent_manager.list(&account.id).await?;
    Ok(ok(agents))
}

pub async fn create_agent(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    payload: Result<Json<CreateAgentRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    info!(account_id = %account.id, "Creating agent");

    let outcome = state.agent_manager.create(&account.id, request).await?;
    Ok((StatusCode::CREATED, ok(outcome)))
}

pub async fn get_agent(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(agent_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let agent = state.agent_manager.get(&account.id, &agent_id).await?;
    Ok(ok(agent))
}

pub async fn update_agent(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(agent_id): Path<String>,
    payload: Result<Json<UpdateAgentRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(patch) = payload?;
    let agent = state
        .agent_manager
        .update(&account.id, &agent_id, patch)
        .await?;
    Ok(ok(agent))
}

pub async fn pause_agent(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(agent_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let agent = state.agent_manager.pause(&account.id, &agent_id).await?;
    Ok(ok(agent))
}

/// Resume failures surface as errors; the agent is left `failed`
pub async fn resume_agent(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(agent_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let agent = state.agent_manager.resume(&account.id, &agent_id).await?;
    Ok(ok(agent))
}

pub async fn delete_agent(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(agent_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.agent_manager.delete(&account.id, &agent_id).await?;
    Ok(ok(json!({ "id": agent_id, "deleted": true })))
}
