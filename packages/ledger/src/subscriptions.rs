// ABOUTME: Subscription records, one per account
// ABOUTME: Agent creation opens or renews a standard plan for a fixed billing period

use agentbay_core::SUBSCRIPTION_PERIOD_DAYS;
use agentbay_storage::{format_timestamp, parse_timestamp, StorageError};
use chrono::{Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::types::Subscription;
use crate::Result;

pub const STATUS_ACTIVE: &str = "active";
pub const PLAN_STANDARD: &str = "standard";

pub struct SubscriptionStorage {
    pool: SqlitePool,
}

impl SubscriptionStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, account_id: &str) -> Result<Option<Subscription>> {
        let row = sqlx::query(
            r#"
            SELECT account_id, status, plan, current_period_start, current_period_end,
                   created_at, updated_at
            FROM subscriptions
            WHERE account_id = ?1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;

        row.map(|r| row_to_subscription(&r)).transpose()
    }
}

/// Upsert an active standard subscription whose period starts now
pub async fn activate_subscription(
    conn: &mut SqliteConnection,
    account_id: &str,
) -> Result<Subscription> {
    let start = Utc::now();
    let end = start + Duration::days(SUBSCRIPTION_PERIOD_DAYS);
    let now = format_timestamp(&start);

    let row = sqlx::query(
        r#"
        INSERT INTO subscriptions (
            account_id, status, plan, current_period_start, current_period_end,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?4, ?4)
        ON CONFLICT(account_id) DO UPDATE SET
            status = excluded.status,
            plan = excluded.plan,
            current_period_start = excluded.current_period_start,
            current_period_end = excluded.current_period_end,
            updated_at = excluded.updated_at
        RETURNING account_id, status, plan, current_period_start, current_period_end,
                  created_at, updated_at
        "#,
    )
    .bind(account_id)
    .bind(STATUS_ACTIVE)
    .bind(PLAN_STANDARD)
    .bind(&now)
    .bind(format_timestamp(&end))
    .fetch_one(&mut *conn)
    .await
    .map_err(StorageError::from)?;

    row_to_subscription(&row)
}

fn row_to_subscription(row: &SqliteRow) -> Result<Subscription> {
    Ok(Subscription {
        account_id: row.get("account_id"),
        status: row.get("status"),
        plan: row.get("plan"),
        current_period_start: parse_timestamp(&row.get::<String, _>("current_period_start"))?,
        current_period_end: parse_timestamp(&row.get::<String, _>("current_period_end"))?,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}
