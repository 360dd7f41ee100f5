// ABOUTME: SQLite-backed integration token store
// ABOUTME: Upserts on the (account_id, provider) unique key

use agentbay_storage::{format_timestamp, parse_timestamp, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::{IntegrationToken, NewIntegrationToken, Provider, TokenStore};

pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn list_for_account(&self, account_id: &str) -> Result<Vec<IntegrationToken>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, provider, access_token, refresh_token,
                   agent_id, identity, created_at, updated_at
            FROM integration_tokens
            WHERE account_id = ?1
            ORDER BY provider
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_token).collect()
    }

    async fn upsert(
        &self,
        account_id: &str,
        token: NewIntegrationToken,
    ) -> Result<IntegrationToken> {
        let now = format_timestamp(&Utc::now());

        let row = sqlx::query(
            r#"
            INSERT INTO integration_tokens (
                id, account_id, provider, access_token, refresh_token,
                agent_id, identity, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT(account_id, provider) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                agent_id = excluded.agent_id,
                identity = excluded.identity,
                updated_at = excluded.updated_at
            RETURNING id, account_id, provider, access_token, refresh_token,
                      agent_id, identity, created_at, updated_at
            "#,
        )
        .bind(agentbay_core::generate_id())
        .bind(account_id)
        .bind(token.provider.as_str())
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(&token.agent_id)
        .bind(&token.identity)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        info!(account_id = %account_id, provider = %token.provider, "Integration connected");

        row_to_token(&row)
    }

    async fn delete(&self, account_id: &str, provider: Provider) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM integration_tokens WHERE account_id = ?1 AND provider = ?2")
                .bind(account_id)
                .bind(provider.as_str())
                .execute(&self.pool)
                .await?;

        let removed = result.rows_affected() > 0;
        debug!(account_id = %account_id, provider = %provider, removed, "Integration disconnected");

        Ok(removed)
    }
}

fn row_to_token(row: &SqliteRow) -> Result<IntegrationToken> {
    Ok(IntegrationToken {
        id: row.get("id"),
        account_id: row.get("account_id"),
        provider: Provider::from_str(&row.get::<String, _>("provider"))?,
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        agent_id: row.get("agent_id"),
        identity: row.get("identity"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}
