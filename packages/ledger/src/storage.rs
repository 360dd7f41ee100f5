// ABOUTME: SQLite persistence for credit ledgers and their transaction log
// ABOUTME: Credits and debits are single-statement atomic updates paired with an audit row

use agentbay_core::MANUAL_RECHARGE_CENTS;
use agentbay_storage::{format_timestamp, parse_timestamp, StorageError};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::policy;
use crate::types::{
    Balance, CreditLedger, CreditOutcome, CreditTransaction, DebitOutcome, LedgerSettings,
    TransactionType,
};
use crate::{LedgerError, Result};

#[derive(Clone)]
pub struct LedgerStorage {
    pool: SqlitePool,
}

impl LedgerStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Current balance; accounts without a ledger row read as zero
    pub async fn get_balance(&self, account_id: &str) -> Result<Balance> {
        Ok(self
            .get_ledger(account_id)
            .await?
            .map(|ledger| Balance::from(&ledger))
            .unwrap_or_default())
    }

    pub async fn get_ledger(&self, account_id: &str) -> Result<Option<CreditLedger>> {
        let row = sqlx::query(
            r#"
            SELECT account_id, balance_cents, auto_recharge_enabled,
                   low_balance_threshold_cents, recharge_amount_cents,
                   created_at, updated_at
            FROM credit_ledgers
            WHERE account_id = ?1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;

        row.map(|r| row_to_ledger(&r)).transpose()
    }

    pub async fn credit(
        &self,
        account_id: &str,
        amount_cents: i64,
        description: &str,
    ) -> Result<CreditOutcome> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let outcome = apply_credit(&mut tx, account_id, amount_cents, description).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(outcome)
    }

    pub async fn debit(
        &self,
        account_id: &str,
        amount_cents: i64,
        description: &str,
    ) -> Result<DebitOutcome> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let outcome = apply_debit(&mut tx, account_id, amount_cents, description).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(outcome)
    }

    /// Fixed top-up; only accounts that already hold a ledger can be recharged
    pub async fn recharge(&self, account_id: &str) -> Result<CreditOutcome> {
        if self.get_ledger(account_id).await?.is_none() {
            return Err(LedgerError::NotFound(account_id.to_string()));
        }

        let outcome = self
            .credit(account_id, MANUAL_RECHARGE_CENTS, "Manual recharge")
            .await?;

        info!(
            account_id = %account_id,
            balance_cents = outcome.new_balance_cents,
            "Account recharged"
        );

        Ok(outcome)
    }

    /// Newest first
    pub async fn list_transactions(
        &self,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<CreditTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount_cents, transaction_type, description,
                   balance_after_cents, created_at
            FROM credit_transactions
            WHERE account_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(account_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;

        rows.iter().map(row_to_transaction).collect()
    }

    pub async fn update_settings(
        &self,
        account_id: &str,
        settings: &LedgerSettings,
    ) -> Result<CreditLedger> {
        for value in [
            settings.low_balance_threshold_cents,
            settings.recharge_amount_cents,
        ]
        .into_iter()
        .flatten()
        {
            if value < 0 {
                return Err(LedgerError::InvalidAmount(value));
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE credit_ledgers SET
                auto_recharge_enabled = COALESCE(?1, auto_recharge_enabled),
                low_balance_threshold_cents = COALESCE(?2, low_balance_threshold_cents),
                recharge_amount_cents = COALESCE(?3, recharge_amount_cents),
                updated_at = ?4
            WHERE account_id = ?5
            "#,
        )
        .bind(settings.auto_recharge_enabled)
        .bind(settings.low_balance_threshold_cents)
        .bind(settings.recharge_amount_cents)
        .bind(format_timestamp(&Utc::now()))
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(account_id.to_string()));
        }

        self.get_ledger(account_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(account_id.to_string()))
    }
}

/// Add credit on an open connection or transaction. Creates the ledger row
/// when the account has none yet.
pub async fn apply_credit(
    conn: &mut SqliteConnection,
    account_id: &str,
    amount_cents: i64,
    description: &str,
) -> Result<CreditOutcome> {
    if amount_cents <= 0 {
        return Err(LedgerError::InvalidAmount(amount_cents));
    }

    let now = format_timestamp(&Utc::now());

    let row = sqlx::query(
        r#"
        INSERT INTO credit_ledgers (
            account_id, balance_cents, auto_recharge_enabled,
            low_balance_threshold_cents, recharge_amount_cents,
            last_change_cents, created_at, updated_at
        ) VALUES (?1, ?2, 0, ?3, ?4, ?2, ?5, ?5)
        ON CONFLICT(account_id) DO UPDATE SET
            balance_cents = credit_ledgers.balance_cents + excluded.balance_cents,
            last_change_cents = excluded.balance_cents,
            updated_at = excluded.updated_at
        RETURNING balance_cents
        "#,
    )
    .bind(account_id)
    .bind(amount_cents)
    .bind(agentbay_core::DEFAULT_LOW_BALANCE_THRESHOLD_CENTS)
    .bind(agentbay_core::DEFAULT_RECHARGE_AMOUNT_CENTS)
    .bind(&now)
    .fetch_one(&mut *conn)
    .await
    .map_err(StorageError::from)?;

    let new_balance_cents: i64 = row.get("balance_cents");

    let transaction = insert_transaction(
        conn,
        account_id,
        amount_cents,
        TransactionType::Credit,
        description,
        new_balance_cents,
    )
    .await?;

    debug!(
        account_id = %account_id,
        amount_cents,
        balance_cents = new_balance_cents,
        "Credited ledger"
    );

    Ok(CreditOutcome {
        new_balance_cents,
        transaction,
    })
}

/// Remove credit on an open connection or transaction. The balance floors at
/// zero in the same statement that reads it, so concurrent debits cannot
/// lose updates. Never rejects for insufficient funds.
pub async fn apply_debit(
    conn: &mut SqliteConnection,
    account_id: &str,
    amount_cents: i64,
    description: &str,
) -> Result<DebitOutcome> {
    if amount_cents < 0 {
        return Err(LedgerError::InvalidAmount(amount_cents));
    }

    let row = sqlx::query(
        r#"
        UPDATE credit_ledgers SET
            balance_cents = MAX(0, balance_cents - ?1),
            last_change_cents = -MIN(balance_cents, ?1),
            updated_at = ?2
        WHERE account_id = ?3
        RETURNING balance_cents, last_change_cents,
                  auto_recharge_enabled, low_balance_threshold_cents
        "#,
    )
    .bind(amount_cents)
    .bind(format_timestamp(&Utc::now()))
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(StorageError::from)?
    .ok_or_else(|| LedgerError::NotFound(account_id.to_string()))?;

    let new_balance_cents: i64 = row.get("balance_cents");
    let change_cents: i64 = row.get("last_change_cents");
    let auto_recharge_enabled: bool = row.get("auto_recharge_enabled");
    let threshold: i64 = row.get("low_balance_threshold_cents");

    let transaction = insert_transaction(
        conn,
        account_id,
        change_cents,
        TransactionType::Debit,
        description,
        new_balance_cents,
    )
    .await?;

    let decision = policy::evaluate(auto_recharge_enabled, threshold, new_balance_cents);

    debug!(
        account_id = %account_id,
        requested_cents = amount_cents,
        applied_cents = -change_cents,
        balance_cents = new_balance_cents,
        "Debited ledger"
    );

    Ok(DebitOutcome {
        new_balance_cents,
        applied_cents: -change_cents,
        recharge_due: decision.recharge_due,
        exhausted: decision.exhausted,
        transaction,
    })
}

async fn insert_transaction(
    conn: &mut SqliteConnection,
    account_id: &str,
    amount_cents: i64,
    transaction_type: TransactionType,
    description: &str,
    balance_after_cents: i64,
) -> Result<CreditTransaction> {
    let transaction = CreditTransaction {
        id: agentbay_core::generate_id(),
        account_id: account_id.to_string(),
        amount_cents,
        transaction_type,
        description: description.to_string(),
        balance_after_cents,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO credit_transactions (
            id, account_id, amount_cents, transaction_type,
            description, balance_after_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&transaction.id)
    .bind(&transaction.account_id)
    .bind(transaction.amount_cents)
    .bind(transaction.transaction_type.as_str())
    .bind(&transaction.description)
    .bind(transaction.balance_after_cents)
    .bind(format_timestamp(&transaction.created_at))
    .execute(&mut *conn)
    .await
    .map_err(StorageError::from)?;

    Ok(transaction)
}

fn row_to_ledger(row: &SqliteRow) -> Result<CreditLedger> {
    Ok(CreditLedger {
        account_id: row.get("account_id"),
        balance_cents: row.get("balance_cents"),
        auto_recharge_enabled: row.get("auto_recharge_enabled"),
        low_balance_threshold_cents: row.get("low_balance_threshold_cents"),
        recharge_amount_cents: row.get("recharge_amount_cents"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_transaction(row: &SqliteRow) -> Result<CreditTransaction> {
    Ok(CreditTransaction {
        id: row.get("id"),
        account_id: row.get("account_id"),
        amount_cents: row.get("amount_cents"),
        transaction_type: TransactionType::from_str(&row.get::<String, _>("transaction_type"))?,
        description: row.get("description"),
        balance_after_cents: row.get("balance_after_cents"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}
