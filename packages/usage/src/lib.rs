// ABOUTME: AI usage metering for Agentbay
// ABOUTME: Records per-call costs, debits the ledger and stops agents when credits run out

pub mod metering;
pub mod storage;
pub mod types;

pub use metering::{estimate_cost, MeteringError, MeteringService, Result};
pub use storage::{insert_log, UsageLogStorage};
pub use types::{
    CostEstimate, CostEstimateRequest, MeteringOutcome, UsageLog, UsageQuery, UsageReport,
};
