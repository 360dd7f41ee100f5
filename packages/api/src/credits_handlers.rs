// ABOUTME: HTTP request handlers for the caller's credit ledger
// ABOUTME: Balance with recent history, auto-recharge settings and manual recharge

use agentbay_ledger::{
    Balance, CreditTransaction, LedgerSettings, RECENT_TRANSACTIONS_LIMIT,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::auth::CurrentAccount;
use crate::error::ApiResult;
use crate::response::ok;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreditsView {
    #[serde(flatten)]
    pub balance: Balance,
    pub transactions: Vec<CreditTransaction>,
}

#[derive(Debug, Serialize)]
pub struct RechargeView {
    pub balance_cents: i64,
    pub transaction: CreditTransaction,
}

/// Balance, auto-recharge settings and the most recent transactions
pub async fn get_credits(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> ApiResult<impl IntoResponse> {
    let balance = state.ledger.get_balance(&account.id).await?;
    let transactions = state
        .ledger
        .list_transactions(&account.id, RECENT_TRANSACTIONS_LIMIT)
        .await?;

    Ok(ok(CreditsView {
        balance,
        transactions,
    }))
}

pub async fn update_settings(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    payload: Result<Json<LedgerSettings>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(settings) = payload?;
    let ledger = state.ledger.update_settings(&account.id, &settings).await?;
    info!(
        account_id = %account.id,
        auto_recharge_enabled = ledger.auto_recharge_enabled,
        "Auto-recharge settings updated"
    );
    Ok(ok(Balance::from(&ledger)))
}

/// Fixed manual top-up, then an advisory push of the new balance to the fleet
pub async fn recharge(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.ledger.recharge(&account.id).await?;
    state
        .reconciler
        .sync_balance(&account.id, outcome.new_balance_cents)
        .await;

    Ok(ok(RechargeView {
        balance_cents: outcome.new_balance_cents,
        transaction: outcome.transaction,
    }))
}
