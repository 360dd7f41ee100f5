// ABOUTME: HTTP request handlers for AI usage queries
// ABOUTME: Lists the caller's usage logs and prices hypothetical calls

use agentbay_usage::{estimate_cost, CostEstimateRequest, UsageQuery};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::IntoResponse,
    Json,
};
use tracing::debug;

use crate::auth::CurrentAccount;
use crate::error::ApiResult;
use crate::response::ok;
use crate::AppState;

/// The caller's usage logs, newest first, paged with `limit` and `offset`
pub async fn list_usage(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    query: Result<Query<UsageQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    debug!(account_id = %account.id, limit = ?query.limit, "Listing usage logs");

    let logs = state
        .usage_log_storage
        .list_logs(&account.id, &query)
        .await?;
    Ok(ok(logs))
}

pub async fn estimate(
    CurrentAccount(_account): CurrentAccount,
    payload: Result<Json<CostEstimateRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    Ok(ok(estimate_cost(&request)))
}
