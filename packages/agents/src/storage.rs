// ABOUTME: SQLite persistence for the agent registry
// ABOUTME: Status and compute pointer always change together so active agents hold compute

use agentbay_storage::{format_timestamp, parse_timestamp, Result, StorageError};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::types::{Agent, AgentStatus, UpdateAgentRequest};

const AGENT_COLUMNS: &str = "id, account_id, template_id, display_name, behavior_spec, \
     config, integrations, compute_id, status, created_at, updated_at";

#[derive(Clone)]
pub struct AgentStorage {
    pool: SqlitePool,
}

impl AgentStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Agent> {
        let query = format!("SELECT {} FROM agents WHERE id = ?1", AGENT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_agent(&row),
            None => Err(StorageError::NotFound(format!("agent {}", id))),
        }
    }

    /// Agents owned by someone else read as missing
    pub async fn get_owned(&self, account_id: &str, id: &str) -> Result<Agent> {
        let query = format!(
            "SELECT {} FROM agents WHERE id = ?1 AND account_id = ?2",
            AGENT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_agent(&row),
            None => Err(StorageError::NotFound(format!("agent {}", id))),
        }
    }

    /// Newest first
    pub async fn list_for_account(&self, account_id: &str) -> Result<Vec<Agent>> {
        let query = format!(
            "SELECT {} FROM agents WHERE account_id = ?1 ORDER BY created_at DESC, rowid DESC",
            AGENT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_agent).collect()
    }

    pub async fn list_by_status(
        &self,
        account_id: &str,
        status: AgentStatus,
    ) -> Result<Vec<Agent>> {
        let query = format!(
            "SELECT {} FROM agents WHERE account_id = ?1 AND status = ?2 ORDER BY created_at",
            AGENT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(account_id)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_agent).collect()
    }

    /// Move an agent to `status`. `compute_id` must be present for `active`
    /// and absent otherwise.
    pub async fn set_status(
        &self,
        id: &str,
        status: AgentStatus,
        compute_id: Option<&str>,
    ) -> Result<()> {
        if (status == AgentStatus::Active) != compute_id.is_some() {
            return Err(StorageError::InvalidStatus(format!(
                "agent {} cannot be {} with compute {:?}",
                id, status, compute_id
            )));
        }

        let result = sqlx::query(
            "UPDATE agents SET status = ?1, compute_id = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(status.as_str())
        .bind(compute_id)
        .bind(format_timestamp(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("agent {}", id)));
        }

        debug!(agent_id = %id, status = %status, "Agent status updated");
        Ok(())
    }

    /// Apply a field patch. A status in the patch only ever names a
    /// compute-less state, so the pointer is left alone.
    pub async fn update_fields(&self, id: &str, patch: &UpdateAgentRequest) -> Result<()> {
        let config = patch.config.as_ref().map(serde_json::to_string).transpose()?;
        let integrations = patch
            .integrations
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE agents SET
                display_name = COALESCE(?1, display_name),
                behavior_spec = COALESCE(?2, behavior_spec),
                config = COALESCE(?3, config),
                integrations = COALESCE(?4, integrations),
                status = COALESCE(?5, status),
                updated_at = ?6
            WHERE id = ?7
            "#,
        )
        .bind(&patch.display_name)
        .bind(&patch.behavior_spec)
        .bind(config)
        .bind(integrations)
        .bind(patch.status.as_ref().map(|s| s.as_str()))
        .bind(format_timestamp(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("agent {}", id)));
        }

        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("agent {}", id)));
        }

        Ok(())
    }
}

/// Insert a new agent on an open connection or transaction
pub async fn insert_agent(conn: &mut SqliteConnection, agent: &Agent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO agents (
            id, account_id, template_id, display_name, behavior_spec,
            config, integrations, compute_id, status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&agent.id)
    .bind(&agent.account_id)
    .bind(&agent.template_id)
    .bind(&agent.display_name)
    .bind(&agent.behavior_spec)
    .bind(serde_json::to_string(&agent.config)?)
    .bind(serde_json::to_string(&agent.integrations)?)
    .bind(&agent.compute_id)
    .bind(agent.status.as_str())
    .bind(format_timestamp(&agent.created_at))
    .bind(format_timestamp(&agent.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn row_to_agent(row: &SqliteRow) -> Result<Agent> {
    Ok(Agent {
        id: row.get("id"),
        account_id: row.get("account_id"),
        template_id: row.get("template_id"),
        display_name: row.get("display_name"),
        behavior_spec: row.get("behavior_spec"),
        config: serde_json::from_str(&row.get::<String, _>("config"))?,
        integrations: serde_json::from_str(&row.get::<String, _>("integrations"))?,
        compute_id: row.get("compute_id"),
        status: AgentStatus::from_str(&row.get::<String, _>("status"))?,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}
