// ABOUTME: Usage metering type definitions
// ABOUTME: Usage log rows, the usage report posted by agent compute, and cost estimates

use agentbay_core::ModelRates;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageLog {
    pub id: String,
    pub account_id: String,
    pub agent_id: Option<String>,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
    /// Nominal cost of the call, before any clamping of the balance
    pub cost_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Cost report sent after each AI invocation. Required fields are optional
/// here so that their absence surfaces as a validation error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageReport {
    #[serde(default, rename = "user_id", alias = "account_id")]
    pub account_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub input_tokens: Option<i64>,
    #[serde(default)]
    pub output_tokens: Option<i64>,
    #[serde(default)]
    pub total_tokens: Option<i64>,
    #[serde(default)]
    pub cost_cents: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MeteringOutcome {
    pub success: bool,
    pub new_balance_cents: i64,
    pub auto_recharge_triggered: bool,
    /// Agents paused because the balance ran out
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paused_agents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CostEstimateRequest {
    pub model: String,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CostEstimate {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub rates: ModelRates,
    pub cost_cents: i64,
}
