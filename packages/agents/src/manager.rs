// ABOUTME: Agent lifecycle manager driving the state machine
// ABOUTME: Database writes are authoritative; fleet failures are advisory or fatal per operation

use agentbay_core::{generate_id, STARTER_CREDITS_CENTS};
use agentbay_fleet::{FleetError, ProvisionTarget, ReconcileOutcome, Reconciler};
use agentbay_ledger::{activate_subscription, apply_credit, LedgerError, LedgerStorage};
use agentbay_storage::StorageError;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::storage::{insert_agent, AgentStorage};
use crate::types::{
    Agent, AgentStatus, CreateAgentOutcome, CreateAgentRequest, UpdateAgentRequest,
};

pub const STARTER_CREDITS_DESCRIPTION: &str = "Starter credits with subscription";

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient credits to resume agent (balance {balance_cents} cents)")]
    InsufficientCredits { balance_cents: i64 },

    #[error("Provisioning failed: {0}")]
    Provisioning(#[source] FleetError),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<StorageError> for ManagerError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => Self::NotFound(what),
            other => Self::Storage(other),
        }
    }
}

impl From<LedgerError> for ManagerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Storage(inner) => Self::from(inner),
            other => Self::Ledger(other),
        }
    }
}

impl From<sqlx::Error> for ManagerError {
    fn from(e: sqlx::Error) -> Self {
        Self::Storage(StorageError::from(e))
    }
}

pub type Result<T> = std::result::Result<T, ManagerError>;

/// Agent lifecycle manager
pub struct AgentManager {
    pool: SqlitePool,
    storage: AgentStorage,
    ledger: LedgerStorage,
    reconciler: Arc<Reconciler>,
}

impl AgentManager {
    pub fn new(pool: SqlitePool, reconciler: Arc<Reconciler>) -> Self {
        Self {
            storage: AgentStorage::new(pool.clone()),
            ledger: LedgerStorage::new(pool.clone()),
            pool,
            reconciler,
        }
    }

    pub fn storage(&self) -> &AgentStorage {
        &self.storage
    }

    /// Create an agent, seed starter credits and open a subscription, then
    /// try to provision. Only the database writes decide success; a failed
    /// provision leaves the agent `pending` or `failed` with an advisory.
    pub async fn create(
        &self,
        account_id: &str,
        request: CreateAgentRequest,
    ) -> Result<CreateAgentOutcome> {
        let template_id = required(request.template_id, "template_id")?;
        let display_name = required(request.display_name, "display_name")?;
        let behavior_spec = required(request.behavior_spec, "behavior_spec")?;
        let config = object_or_empty(request.config, "config")?;
        let integrations = object_or_empty(request.integrations, "integrations")?;

        let now = Utc::now();
        let agent = Agent {
            id: generate_id(),
            account_id: account_id.to_string(),
            template_id,
            display_name,
            behavior_spec,
            config,
            integrations,
            compute_id: None,
            status: AgentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        insert_agent(&mut tx, &agent).await?;
        activate_subscription(&mut tx, account_id).await?;
        let credit = apply_credit(
            &mut tx,
            account_id,
            STARTER_CREDITS_CENTS,
            STARTER_CREDITS_DESCRIPTION,
        )
        .await?;
        tx.commit().await?;

        info!(
            agent_id = %agent.id,
            account_id = %account_id,
            balance_cents = credit.new_balance_cents,
            "Agent created"
        );

        // Advisory; the reconciler logs failures
        let _ = self
            .reconciler
            .sync_balance(account_id, credit.new_balance_cents)
            .await;

        self.storage
            .set_status(&agent.id, AgentStatus::Provisioning, None)
            .await?;

        let advisory = match self.reconciler.provision(&provision_target(&agent)).await {
            ReconcileOutcome::Done(compute_id) => {
                self.storage
                    .set_status(&agent.id, AgentStatus::Active, Some(compute_id.as_str()))
                    .await?;
                None
            }
            ReconcileOutcome::Advisory(e) => {
                warn!(agent_id = %agent.id, error = %e, "Agent left pending after create");
                self.storage
                    .set_status(&agent.id, AgentStatus::Pending, None)
                    .await?;
                Some("Agent created, provisioning in progress".to_string())
            }
            ReconcileOutcome::Fatal(e) => {
                warn!(agent_id = %agent.id, error = %e, "Agent marked failed after create");
                self.storage
                    .set_status(&agent.id, AgentStatus::Failed, None)
                    .await?;
                Some(format!(
                    "Agent created, but provisioning failed ({}). Resume the agent to retry.",
                    e
                ))
            }
        };

        Ok(CreateAgentOutcome {
            agent: self.storage.get(&agent.id).await?,
            balance_cents: credit.new_balance_cents,
            advisory,
        })
    }

    pub async fn get(&self, account_id: &str, agent_id: &str) -> Result<Agent> {
        Ok(self.storage.get_owned(account_id, agent_id).await?)
    }

    pub async fn list(&self, account_id: &str) -> Result<Vec<Agent>> {
        Ok(self.storage.list_for_account(account_id).await?)
    }

    /// Whitelisted field patch with no effect on compute. Running state is
    /// only changed through pause and resume.
    pub async fn update(
        &self,
        account_id: &str,
        agent_id: &str,
        patch: UpdateAgentRequest,
    ) -> Result<Agent> {
        let agent = self.storage.get_owned(account_id, agent_id).await?;

        if patch.is_empty() {
            return Err(invalid("no updatable fields supplied"));
        }
        for (field, value) in [
            ("display_name", &patch.display_name),
            ("behavior_spec", &patch.behavior_spec),
        ] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(invalid(&format!("{} must not be empty", field)));
            }
        }
        for (field, value) in [
            ("config", &patch.config),
            ("integrations", &patch.integrations),
        ] {
            if matches!(value, Some(v) if !v.is_object()) {
                return Err(invalid(&format!("{} must be an object", field)));
            }
        }
        if let Some(status) = patch.status {
            if matches!(status, AgentStatus::Active | AgentStatus::Provisioning) {
                return Err(ManagerError::Validation(format!(
                    "status '{}' can only be reached through resume",
                    status
                )));
            }
            if agent.status == AgentStatus::Active {
                return Err(ManagerError::Validation(
                    "pause a running agent before changing its status".to_string(),
                ));
            }
        }

        self.storage.update_fields(agent_id, &patch).await?;
        debug!(agent_id = %agent_id, "Agent updated");

        Ok(self.storage.get(agent_id).await?)
    }

    /// Release compute and mark the agent paused. Fleet failures are logged
    /// and never block the pause.
    pub async fn pause(&self, account_id: &str, agent_id: &str) -> Result<Agent> {
        let agent = self.storage.get_owned(account_id, agent_id).await?;
        self.pause_agent(agent).await
    }

    async fn pause_agent(&self, agent: Agent) -> Result<Agent> {
        if agent.status == AgentStatus::Paused {
            debug!(agent_id = %agent.id, "Agent already paused");
            return Ok(agent);
        }

        if let ReconcileOutcome::Advisory(e) | ReconcileOutcome::Fatal(e) =
            self.release_compute(&agent).await
        {
            warn!(agent_id = %agent.id, error = %e, "Pausing without confirmed teardown");
        }

        self.storage
            .set_status(&agent.id, AgentStatus::Paused, None)
            .await?;
        info!(agent_id = %agent.id, account_id = %agent.account_id, "Agent paused");

        Ok(self.storage.get(&agent.id).await?)
    }

    /// Pause every running agent of an account, returning the ids paused
    pub async fn pause_all_active(&self, account_id: &str) -> Result<Vec<String>> {
        let mut paused = Vec::new();
        for agent in self
            .storage
            .list_by_status(account_id, AgentStatus::Active)
            .await?
        {
            let id = agent.id.clone();
            match self.pause_agent(agent).await {
                Ok(_) => paused.push(id),
                // Deleted between listing and pausing
                Err(ManagerError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(paused)
    }

    /// Bring an agent back up. Requires a positive balance; a failed provision
    /// leaves the agent `failed` and is reported to the caller.
    pub async fn resume(&self, account_id: &str, agent_id: &str) -> Result<Agent> {
        let agent = self.storage.get_owned(account_id, agent_id).await?;

        let balance_cents = self.ledger.get_balance(account_id).await?.balance_cents;
        if balance_cents <= 0 {
            return Err(ManagerError::InsufficientCredits { balance_cents });
        }

        if agent.status == AgentStatus::Active {
            debug!(agent_id = %agent.id, "Agent already running");
            return Ok(agent);
        }

        self.storage
            .set_status(&agent.id, AgentStatus::Provisioning, None)
            .await?;

        match self.reconciler.provision(&provision_target(&agent)).await {
            ReconcileOutcome::Done(compute_id) => {
                match self
                    .storage
                    .set_status(&agent.id, AgentStatus::Active, Some(compute_id.as_str()))
                    .await
                {
                    Ok(()) => {}
                    Err(StorageError::NotFound(what)) => {
                        // Deleted while provisioning; release the orphaned compute
                        warn!(agent_id = %agent.id, "Agent deleted during resume");
                        let _ = self
                            .reconciler
                            .deprovision(&agent.id, Some(compute_id.as_str()))
                            .await;
                        return Err(ManagerError::NotFound(what));
                    }
                    Err(e) => return Err(e.into()),
                }
                info!(agent_id = %agent.id, compute_id = %compute_id, "Agent resumed");
                Ok(self.storage.get(&agent.id).await?)
            }
            ReconcileOutcome::Advisory(e) | ReconcileOutcome::Fatal(e) => {
                self.storage
                    .set_status(&agent.id, AgentStatus::Failed, None)
                    .await?;
                error!(agent_id = %agent.id, error = %e, "Resume failed");
                Err(ManagerError::Provisioning(e))
            }
        }
    }

    /// Best-effort teardown, then hard delete
    pub async fn delete(&self, account_id: &str, agent_id: &str) -> Result<()> {
        let agent = self.storage.get_owned(account_id, agent_id).await?;

        if let ReconcileOutcome::Advisory(e) | ReconcileOutcome::Fatal(e) =
            self.release_compute(&agent).await
        {
            warn!(agent_id = %agent.id, error = %e, "Deleting without confirmed teardown");
        }

        self.storage.delete(&agent.id).await?;
        info!(agent_id = %agent.id, account_id = %account_id, "Agent deleted");
        Ok(())
    }

    async fn release_compute(&self, agent: &Agent) -> ReconcileOutcome<()> {
        if !agent.may_hold_compute() {
            debug!(agent_id = %agent.id, "No compute to release");
            return ReconcileOutcome::Done(());
        }
        self.reconciler.release(&agent.id).await
    }
}

fn provision_target(agent: &Agent) -> ProvisionTarget {
    ProvisionTarget {
        agent_id: agent.id.clone(),
        account_id: agent.account_id.clone(),
        display_name: agent.display_name.clone(),
        behavior_spec: agent.behavior_spec.clone(),
        config: agent.config.clone(),
        integrations: agent.integrations.clone(),
        compute_id: None,
    }
}

fn invalid(message: &str) -> ManagerError {
    ManagerError::Validation(message.to_string())
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ManagerError::Validation(format!("{} is required", field))),
    }
}

fn object_or_empty(value: Option<Value>, field: &str) -> Result<Value> {
    match value {
        None | Some(Value::Null) => Ok(Value::Object(Default::default())),
        Some(v @ Value::Object(_)) => Ok(v),
        Some(_) => Err(ManagerError::Validation(format!("{} must be an object", field))),
    }
}
