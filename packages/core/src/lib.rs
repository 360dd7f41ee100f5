// ABOUTME: Core constants, identifiers and pricing for Agentbay
// ABOUTME: Foundational package shared by the ledger, registry and metering packages

pub mod constants;
pub mod pricing;
pub mod utils;

// Re-export constants
pub use constants::{
    agentbay_dir, DEFAULT_LOW_BALANCE_THRESHOLD_CENTS, DEFAULT_RECHARGE_AMOUNT_CENTS,
    MANUAL_RECHARGE_CENTS, STARTER_CREDITS_CENTS, SUBSCRIPTION_PERIOD_DAYS,
};

// Re-export pricing
pub use pricing::{cost_cents, ModelRates};

// Re-export utilities
pub use utils::{generate_id, secrets_match};
