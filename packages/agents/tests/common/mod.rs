// ABOUTME: Common test utilities for agent lifecycle tests
// ABOUTME: In-process fleet manager double plus a wired-up manager over in-memory SQLite

#![allow(dead_code)]

use agentbay_agents::{AgentManager, CreateAgentRequest};
use agentbay_fleet::{FleetError, Orchestrator, ProvisionRequest, Reconciler};
use agentbay_integrations::SqliteTokenStore;
use agentbay_ledger::LedgerStorage;
use agentbay_storage::{init_memory_pool, AccountStorage};
use async_trait::async_trait;
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FleetMode {
    /// Provisions succeed
    Accept,
    /// Every call fails with a network error
    Down,
    /// Provisions are rejected with a 422
    Reject,
}

/// Fleet manager double that records every call
pub struct FakeFleet {
    mode: Mutex<FleetMode>,
    next_id: AtomicUsize,
    pub provisions: Mutex<Vec<ProvisionRequest>>,
    pub deprovisions: Mutex<Vec<String>>,
    pub balance_syncs: Mutex<Vec<(String, i64)>>,
}

impl FakeFleet {
    pub fn new(mode: FleetMode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            next_id: AtomicUsize::new(1),
            provisions: Mutex::new(Vec::new()),
            deprovisions: Mutex::new(Vec::new()),
            balance_syncs: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: FleetMode) {
        *self.mode.lock().unwrap() = mode;
    }

    fn mode(&self) -> FleetMode {
        *self.mode.lock().unwrap()
    }

    pub fn provision_count(&self) -> usize {
        self.provisions.lock().unwrap().len()
    }

    pub fn deprovision_count(&self) -> usize {
        self.deprovisions.lock().unwrap().len()
    }
}

#[async_trait]
impl Orchestrator for FakeFleet {
    async fn provision(&self, request: &ProvisionRequest) -> agentbay_fleet::Result<String> {
        self.provisions.lock().unwrap().push(request.clone());
        match self.mode() {
            FleetMode::Accept => Ok(format!(
                "ctr-{}",
                self.next_id.fetch_add(1, Ordering::SeqCst)
            )),
            FleetMode::Down => Err(FleetError::Network("connection refused".into())),
            FleetMode::Reject => Err(FleetError::Rejected {
                status: 422,
                body: "unknown template".into(),
            }),
        }
    }

    async fn deprovision(&self, agent_id: &str) -> agentbay_fleet::Result<()> {
        self.deprovisions.lock().unwrap().push(agent_id.to_string());
        match self.mode() {
            FleetMode::Down => Err(FleetError::Network("connection refused".into())),
            _ => Ok(()),
        }
    }

    async fn sync_balance(
        &self,
        account_id: &str,
        balance_cents: i64,
    ) -> agentbay_fleet::Result<()> {
        self.balance_syncs
            .lock()
            .unwrap()
            .push((account_id.to_string(), balance_cents));
        match self.mode() {
            FleetMode::Down => Err(FleetError::Network("connection refused".into())),
            _ => Ok(()),
        }
    }
}

pub struct TestContext {
    pub pool: SqlitePool,
    pub fleet: Arc<FakeFleet>,
    pub ledger: LedgerStorage,
    pub manager: AgentManager,
    pub account_id: String,
}

pub async fn setup(mode: FleetMode) -> TestContext {
    let pool = init_memory_pool().await.unwrap();
    let account = AccountStorage::new(pool.clone())
        .get_or_create("user_test", Some("test@example.com"))
        .await
        .unwrap();

    let fleet = FakeFleet::new(mode);
    let tokens = Arc::new(SqliteTokenStore::new(pool.clone()));
    let reconciler =
        Reconciler::new(fleet.clone(), tokens).with_deprovision_retries(0, Duration::ZERO);

    TestContext {
        ledger: LedgerStorage::new(pool.clone()),
        manager: AgentManager::new(pool.clone(), Arc::new(reconciler)),
        pool,
        fleet,
        account_id: account.id,
    }
}

pub fn create_request(name: &str) -> CreateAgentRequest {
    CreateAgentRequest {
        template_id: Some("t1".to_string()),
        display_name: Some(name.to_string()),
        behavior_spec: Some("# Soul\nTriage my inbox every morning.".to_string()),
        config: Some(json!({"timezone": "Europe/Berlin"})),
        integrations: Some(json!({"gmail": {"enabled": true}})),
    }
}

/// Rows violating "active exactly when a compute pointer is held"
pub async fn invariant_violations(pool: &SqlitePool) -> i64 {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM agents WHERE (status = 'active') != (compute_id IS NOT NULL)",
    )
    .fetch_one(pool)
    .await
    .unwrap();
    count
}
