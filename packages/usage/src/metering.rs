// ABOUTME: Usage metering callback handling
// ABOUTME: Authenticates cost reports, debits credits with a usage log and pauses agents on exhaustion

use agentbay_agents::{AgentManager, ManagerError};
use agentbay_core::{cost_cents, generate_id, secrets_match, ModelRates};
use agentbay_ledger::{apply_debit, LedgerError};
use agentbay_storage::StorageError;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::storage::insert_log;
use crate::types::{CostEstimate, CostEstimateRequest, MeteringOutcome, UsageLog, UsageReport};

const UNKNOWN_MODEL: &str = "unknown";

#[derive(Error, Debug)]
pub enum MeteringError {
    #[error("Invalid callback credentials")]
    Unauthorized,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("No credit ledger for account {0}")]
    NotFound(String),
    #[error(transparent)]
    Ledger(LedgerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<LedgerError> for MeteringError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(account_id) => MeteringError::NotFound(account_id),
            LedgerError::Storage(e) => MeteringError::Storage(e),
            other => MeteringError::Ledger(other),
        }
    }
}

impl From<sqlx::Error> for MeteringError {
    fn from(err: sqlx::Error) -> Self {
        MeteringError::Storage(StorageError::from(err))
    }
}

pub type Result<T> = std::result::Result<T, MeteringError>;

pub struct MeteringService {
    pool: SqlitePool,
    secret: String,
    manager: Arc<AgentManager>,
}

impl MeteringService {
    /// An empty secret rejects every callback
    pub fn new(pool: SqlitePool, secret: impl Into<String>, manager: Arc<AgentManager>) -> Self {
        Self {
            pool,
            secret: secret.into(),
            manager,
        }
    }

    /// Charge one AI invocation against the reporting account.
    ///
    /// The debit and its usage log commit together. When the debit exhausts
    /// the balance the reporting agent is paused, or every active agent of the
    /// account when the report names none. Pause failures are logged only:
    /// the charge has already committed and must not be retried.
    pub async fn record_usage(
        &self,
        presented_secret: Option<&str>,
        report: UsageReport,
    ) -> Result<MeteringOutcome> {
        let authorized = presented_secret
            .map(|secret| secrets_match(secret, &self.secret))
            .unwrap_or(false);
        if !authorized {
            warn!("Rejected usage callback with invalid credentials");
            return Err(MeteringError::Unauthorized);
        }

        let account_id = report
            .account_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MeteringError::Validation("user_id is required".to_string()))?
            .to_string();
        let cost = report
            .cost_cents
            .ok_or_else(|| MeteringError::Validation("cost_cents is required".to_string()))?;
        if cost < 0 {
            return Err(MeteringError::Validation(format!(
                "cost_cents must be non-negative, got {cost}"
            )));
        }

        let model = report
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(UNKNOWN_MODEL)
            .to_string();
        let input_tokens = report.input_tokens.unwrap_or(0).max(0);
        let output_tokens = report.output_tokens.unwrap_or(0).max(0);
        let agent_id = report
            .agent_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let log = UsageLog {
            id: generate_id(),
            account_id: account_id.clone(),
            agent_id: agent_id.clone(),
            model: model.clone(),
            input_tokens,
            output_tokens,
            total_tokens: report
                .total_tokens
                .unwrap_or_else(|| input_tokens.saturating_add(output_tokens))
                .max(0),
            cost_cents: cost,
            created_at: Utc::now(),
        };

        let mut tx = self.pool.begin().await?;
        let debit = apply_debit(&mut tx, &account_id, cost, &format!("AI usage: {model}")).await?;
        insert_log(&mut tx, &log).await?;
        tx.commit().await?;

        debug!(
            account_id = %account_id,
            model = %model,
            cost_cents = cost,
            applied_cents = debit.applied_cents,
            new_balance_cents = debit.new_balance_cents,
            "Usage recorded"
        );

        if debit.recharge_due {
            info!(
                account_id = %account_id,
                balance_cents = debit.new_balance_cents,
                "Balance below auto-recharge threshold"
            );
        }

        let paused_agents = if debit.exhausted {
            info!(account_id = %account_id, "Credits exhausted, pausing agents");
            self.pause_for_exhaustion(&account_id, agent_id.as_deref())
                .await
        } else {
            Vec::new()
        };

        Ok(MeteringOutcome {
            success: true,
            new_balance_cents: debit.new_balance_cents,
            auto_recharge_triggered: debit.recharge_due,
            paused_agents,
        })
    }

    async fn pause_for_exhaustion(&self, account_id: &str, agent_id: Option<&str>) -> Vec<String> {
        match agent_id {
            Some(agent_id) => match self.manager.pause(account_id, agent_id).await {
                Ok(agent) => vec![agent.id],
                Err(ManagerError::NotFound(_)) => {
                    warn!(
                        account_id = %account_id,
                        agent_id = %agent_id,
                        "Usage reported for an agent this account does not own"
                    );
                    Vec::new()
                }
                Err(e) => {
                    warn!(agent_id = %agent_id, error = %e, "Failed to pause exhausted agent");
                    Vec::new()
                }
            },
            None => match self.manager.pause_all_active(account_id).await {
                Ok(paused) => paused,
                Err(e) => {
                    warn!(account_id = %account_id, error = %e, "Failed to pause active agents");
                    Vec::new()
                }
            },
        }
    }
}

pub fn estimate_cost(request: &CostEstimateRequest) -> CostEstimate {
    let rates = ModelRates::for_model(&request.model);
    CostEstimate {
        model: request.model.clone(),
        input_tokens: request.input_tokens,
        output_tokens: request.output_tokens,
        rates,
        cost_cents: cost_cents(&rates, request.input_tokens, request.output_tokens),
    }
}
