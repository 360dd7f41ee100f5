// ABOUTME: Credit ledger type definitions
// ABOUTME: Ledger rows, audit transactions, balance views and subscription records

use agentbay_storage::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditLedger {
    pub account_id: String,
    pub balance_cents: i64,
    pub auto_recharge_enabled: bool,
    pub low_balance_threshold_cents: i64,
    pub recharge_amount_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read-side view of a ledger. Accounts without a ledger row read as zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    pub balance_cents: i64,
    pub auto_recharge_enabled: bool,
    pub low_balance_threshold_cents: i64,
    pub recharge_amount_cents: i64,
}

impl From<&CreditLedger> for Balance {
    fn from(ledger: &CreditLedger) -> Self {
        Self {
            balance_cents: ledger.balance_cents,
            auto_recharge_enabled: ledger.auto_recharge_enabled,
            low_balance_threshold_cents: ledger.low_balance_threshold_cents,
            recharge_amount_cents: ledger.recharge_amount_cents,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, StorageError> {
        match s {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            _ => Err(StorageError::InvalidStatus(format!(
                "unknown transaction type '{}'",
                s
            ))),
        }
    }
}

/// Append-only audit record. `amount_cents` is the signed effect actually
/// applied to the balance, so debits that hit the floor record the clamped amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditTransaction {
    pub id: String,
    pub account_id: String,
    pub amount_cents: i64,
    pub transaction_type: TransactionType,
    pub description: String,
    pub balance_after_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of a credit
#[derive(Debug, Clone, PartialEq)]
pub struct CreditOutcome {
    pub new_balance_cents: i64,
    pub transaction: CreditTransaction,
}

/// Result of a debit, including the post-debit policy decision
#[derive(Debug, Clone, PartialEq)]
pub struct DebitOutcome {
    pub new_balance_cents: i64,
    /// Cents actually removed, at most the requested amount
    pub applied_cents: i64,
    pub recharge_due: bool,
    pub exhausted: bool,
    pub transaction: CreditTransaction,
}

/// Partial update of the auto-recharge settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LedgerSettings {
    pub auto_recharge_enabled: Option<bool>,
    pub low_balance_threshold_cents: Option<i64>,
    pub recharge_amount_cents: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub account_id: String,
    pub status: String,
    pub plan: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
