// ABOUTME: Provisioning reconciler between agent intent and the fleet manager
// ABOUTME: Returns tagged outcomes so each call site chooses which failures are fatal

use agentbay_integrations::{IntegrationToken, TokenStore};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::orchestrator::{FleetError, Orchestrator, ProvisionRequest};

/// Outcome of a fleet call. Transient failures (timeouts, network, 5xx) are
/// advisory; rejections, auth failures and malformed responses are fatal.
#[derive(Debug)]
pub enum ReconcileOutcome<T> {
    Done(T),
    Advisory(FleetError),
    Fatal(FleetError),
}

impl<T> ReconcileOutcome<T> {
    pub fn classify(result: Result<T, FleetError>) -> Self {
        match result {
            Ok(value) => Self::Done(value),
            Err(e) if e.is_transient() => Self::Advisory(e),
            Err(e) => Self::Fatal(e),
        }
    }

    /// Collapse into a plain result, treating both failure kinds as errors
    pub fn into_result(self) -> Result<T, FleetError> {
        match self {
            Self::Done(value) => Ok(value),
            Self::Advisory(e) | Self::Fatal(e) => Err(e),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// What the reconciler needs to know about an agent
#[derive(Debug, Clone)]
pub struct ProvisionTarget {
    pub agent_id: String,
    pub account_id: String,
    pub display_name: String,
    pub behavior_spec: String,
    pub config: Value,
    pub integrations: Value,
    /// Set when the agent is already running
    pub compute_id: Option<String>,
}

pub struct Reconciler {
    orchestrator: Arc<dyn Orchestrator>,
    tokens: Arc<dyn TokenStore>,
    deprovision_retries: u32,
    retry_backoff: Duration,
}

impl Reconciler {
    pub fn new(orchestrator: Arc<dyn Orchestrator>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            orchestrator,
            tokens,
            deprovision_retries: 2,
            retry_backoff: Duration::from_millis(250),
        }
    }

    /// Extra attempts for transient deprovision failures
    pub fn with_deprovision_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.deprovision_retries = retries;
        self.retry_backoff = backoff;
        self
    }

    /// Stand up compute for an agent. An agent that already holds a compute
    /// pointer gets that pointer back without a fleet call.
    pub async fn provision(&self, target: &ProvisionTarget) -> ReconcileOutcome<String> {
        if let Some(existing) = &target.compute_id {
            debug!(agent_id = %target.agent_id, "Agent already provisioned");
            return ReconcileOutcome::Done(existing.clone());
        }

        // Missing credentials degrade connected channels, not the agent itself
        let tokens = match self.tokens.list_for_account(&target.account_id).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(
                    account_id = %target.account_id,
                    error = %e,
                    "Could not load integration tokens, provisioning without them"
                );
                Vec::new()
            }
        };

        let request = ProvisionRequest {
            agent_id: target.agent_id.clone(),
            account_id: target.account_id.clone(),
            behavior_spec: target.behavior_spec.clone(),
            display_name: target.display_name.clone(),
            config: target.config.clone(),
            integrations: merge_tokens(&target.integrations, &tokens),
        };

        let outcome = ReconcileOutcome::classify(self.orchestrator.provision(&request).await);
        match &outcome {
            ReconcileOutcome::Done(compute_id) => info!(
                agent_id = %target.agent_id,
                compute_id = %compute_id,
                "Agent compute provisioned"
            ),
            ReconcileOutcome::Advisory(e) => warn!(
                agent_id = %target.agent_id,
                error = %e,
                "Provisioning did not complete, may succeed on retry"
            ),
            ReconcileOutcome::Fatal(e) => warn!(
                agent_id = %target.agent_id,
                error = %e,
                "Provisioning rejected"
            ),
        }
        outcome
    }

    /// Release an agent's compute. Without a compute pointer there is nothing
    /// to release. Transient failures are retried a bounded number of times.
    pub async fn deprovision(
        &self,
        agent_id: &str,
        compute_id: Option<&str>,
    ) -> ReconcileOutcome<()> {
        if compute_id.is_none() {
            debug!(agent_id = %agent_id, "No compute to release");
            return ReconcileOutcome::Done(());
        }
        self.release(agent_id).await
    }

    /// Tear down whatever the fleet runs for an agent, keyed by agent id.
    /// Used when compute may exist without a recorded pointer.
    pub async fn release(&self, agent_id: &str) -> ReconcileOutcome<()> {
        let mut attempt = 0;
        loop {
            match self.orchestrator.deprovision(agent_id).await {
                Ok(()) => {
                    info!(agent_id = %agent_id, "Agent compute released");
                    return ReconcileOutcome::Done(());
                }
                Err(e) if e.is_transient() && attempt < self.deprovision_retries => {
                    attempt += 1;
                    warn!(
                        agent_id = %agent_id,
                        attempt,
                        error = %e,
                        "Deprovision failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => {
                    warn!(agent_id = %agent_id, error = %e, "Deprovision failed");
                    return ReconcileOutcome::classify(Err(e));
                }
            }
        }
    }

    /// Push a new balance to the fleet; callers treat every failure as advisory
    pub async fn sync_balance(&self, account_id: &str, balance_cents: i64) -> ReconcileOutcome<()> {
        let result = self.orchestrator.sync_balance(account_id, balance_cents).await;
        let outcome = ReconcileOutcome::classify(result);
        if let ReconcileOutcome::Advisory(e) | ReconcileOutcome::Fatal(e) = &outcome {
            warn!(account_id = %account_id, error = %e, "Balance sync failed");
        }
        outcome
    }
}

/// Attach the account's credentials to the agent's integrations map under `tokens`
fn merge_tokens(integrations: &Value, tokens: &[IntegrationToken]) -> Value {
    let mut merged = match integrations {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    let token_map: Map<String, Value> = tokens
        .iter()
        .map(|token| {
            (
                token.provider.as_str().to_string(),
                serde_json::json!({
                    "access_token": token.access_token,
                    "refresh_token": token.refresh_token,
                    "identity": token.identity,
                }),
            )
        })
        .collect();

    merged.insert("tokens".to_string(), Value::Object(token_map));
    Value::Object(merged)
}
