// ABOUTME: Shared constants for credits, subscriptions and ledger defaults
// ABOUTME: Also locates the per-user Agentbay data directory

use std::env;
use std::path::PathBuf;

/// Credits granted when an account creates an agent (and its subscription)
pub const STARTER_CREDITS_CENTS: i64 = 1000;

/// Fixed amount added by a manual recharge ($25)
pub const MANUAL_RECHARGE_CENTS: i64 = 2500;

/// Length of a subscription billing period
pub const SUBSCRIPTION_PERIOD_DAYS: i64 = 30;

/// Ledger defaults for a freshly created account
pub const DEFAULT_LOW_BALANCE_THRESHOLD_CENTS: i64 = 500;
pub const DEFAULT_RECHARGE_AMOUNT_CENTS: i64 = 2500;

/// Get the path to the Agentbay directory (~/.agentbay)
pub fn agentbay_dir() -> PathBuf {
    // First try HOME environment variable (useful for tests)
    if let Ok(home) = env::var("HOME") {
        PathBuf::from(home).join(".agentbay")
    } else {
        dirs::home_dir()
            .unwrap_or_else(env::temp_dir)
            .join(".agentbay")
    }
}
