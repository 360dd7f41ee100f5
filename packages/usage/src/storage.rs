// ABOUTME: Usage log storage layer using SQLite
// ABOUTME: Append-only writes inside the metering transaction and paged reads

use agentbay_storage::{format_timestamp, parse_timestamp, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::types::{UsageLog, UsageQuery};

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

pub struct UsageLogStorage {
    pool: SqlitePool,
}

impl UsageLogStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_log(&self, log: &UsageLog) -> Result<UsageLog> {
        let mut conn = self.pool.acquire().await?;
        insert_log(&mut conn, log).await?;
        Ok(log.clone())
    }

    /// An account's logs, newest first
    pub async fn list_logs(&self, account_id: &str, query: &UsageQuery) -> Result<Vec<UsageLog>> {
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(0, MAX_LIMIT);
        let offset = query.offset.unwrap_or(0).max(0);

        debug!(account_id = %account_id, limit, offset, "Fetching usage logs");

        let rows = sqlx::query(
            r#"
            SELECT id, account_id, agent_id, model, input_tokens, output_tokens,
                   total_tokens, cost_cents, created_at
            FROM usage_logs
            WHERE account_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_log).collect()
    }
}

pub async fn insert_log(conn: &mut SqliteConnection, log: &UsageLog) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO usage_logs (
            id, account_id, agent_id, model, input_tokens, output_tokens,
            total_tokens, cost_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&log.id)
    .bind(&log.account_id)
    .bind(&log.agent_id)
    .bind(&log.model)
    .bind(log.input_tokens)
    .bind(log.output_tokens)
    .bind(log.total_tokens)
    .bind(log.cost_cents)
    .bind(format_timestamp(&log.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn row_to_log(row: &SqliteRow) -> Result<UsageLog> {
    Ok(UsageLog {
        id: row.get("id"),
        account_id: row.get("account_id"),
        agent_id: row.get("agent_id"),
        model: row.get("model"),
        input_tokens: row.get("input_tokens"),
        output_tokens: row.get("output_tokens"),
        total_tokens: row.get("total_tokens"),
        cost_cents: row.get("cost_cents"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}
