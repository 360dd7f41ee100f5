// ABOUTME: Account persistence keyed by the identity provider's user id
// ABOUTME: Lazily creates the account row together with its zero-balance credit ledger

use agentbay_core::{
    generate_id, DEFAULT_LOW_BALANCE_THRESHOLD_CENTS, DEFAULT_RECHARGE_AMOUNT_CENTS,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::{format_timestamp, parse_timestamp, Result, StorageError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    /// Identifier issued by the external identity provider
    pub external_id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct AccountStorage {
    pool: SqlitePool,
}

impl AccountStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Account> {
        let row = sqlx::query(
            "SELECT id, external_id, email, created_at, updated_at FROM accounts WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(StorageError::NotFound(format!("account {}", id))),
        }
    }

    pub async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, external_id, email, created_at, updated_at
            FROM accounts
            WHERE external_id = ?1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_account(&r)).transpose()
    }

    /// Resolve an external identity to an account, creating the account and
    /// its empty credit ledger on first sight. A supplied email replaces the
    /// stored one.
    pub async fn get_or_create(&self, external_id: &str, email: Option<&str>) -> Result<Account> {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(StorageError::InvalidInput(
                "external account id must not be empty".to_string(),
            ));
        }

        let now = format_timestamp(&Utc::now());
        let placeholder = format!("{}@placeholder.local", external_id);

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO accounts (id, external_id, email, created_at, updated_at)
            VALUES (?1, ?2, COALESCE(?3, ?4), ?5, ?5)
            ON CONFLICT(external_id) DO UPDATE SET
                email = COALESCE(?3, accounts.email),
                updated_at = CASE WHEN ?3 IS NULL THEN accounts.updated_at ELSE ?5 END
            RETURNING id, external_id, email, created_at, updated_at
            "#,
        )
        .bind(generate_id())
        .bind(external_id)
        .bind(email)
        .bind(&placeholder)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;

        let account = row_to_account(&row)?;

        let created = sqlx::query(
            r#"
            INSERT INTO credit_ledgers (
                account_id, balance_cents, auto_recharge_enabled,
                low_balance_threshold_cents, recharge_amount_cents,
                last_change_cents, created_at, updated_at
            ) VALUES (?1, 0, 0, ?2, ?3, 0, ?4, ?4)
            ON CONFLICT(account_id) DO NOTHING
            "#,
        )
        .bind(&account.id)
        .bind(DEFAULT_LOW_BALANCE_THRESHOLD_CENTS)
        .bind(DEFAULT_RECHARGE_AMOUNT_CENTS)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        if created > 0 {
            debug!("Created account {} for {}", account.id, external_id);
        }

        Ok(account)
    }
}

fn row_to_account(row: &SqliteRow) -> Result<Account> {
    Ok(Account {
        id: row.get("id"),
        external_id: row.get("external_id"),
        email: row.get("email"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}
