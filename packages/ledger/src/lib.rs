// ABOUTME: Prepaid credit ledger for Agentbay accounts
// ABOUTME: Atomic credits and clamped debits, audit log, recharge policy and subscriptions

pub mod policy;
pub mod storage;
pub mod subscriptions;
pub mod types;

use agentbay_storage::StorageError;
use thiserror::Error;

pub use policy::PolicyDecision;
pub use storage::{apply_credit, apply_debit, LedgerStorage};
pub use subscriptions::{activate_subscription, SubscriptionStorage};
pub use types::{
    Balance, CreditLedger, CreditOutcome, CreditTransaction, DebitOutcome, LedgerSettings,
    Subscription, TransactionType,
};

/// How many transactions the credits view returns
pub const RECENT_TRANSACTIONS_LIMIT: i64 = 20;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("No credit ledger for account {0}")]
    NotFound(String),
    #[error("Invalid amount: {0} cents")]
    InvalidAmount(i64),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
