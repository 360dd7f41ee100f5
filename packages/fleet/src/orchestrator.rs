// ABOUTME: Orchestrator trait for the external fleet manager
// ABOUTME: Provision and deprovision backing compute, push balances; typed transient/terminal failures

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Fleet manager timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Fleet manager error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    #[error("Fleet manager rejected request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Fleet manager authentication failed: {0}")]
    Unauthorized(String),

    #[error("Invalid response from fleet manager: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FleetError {
    /// Failures that may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Network(_) | Self::Server { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;

/// Body of a provision request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvisionRequest {
    pub agent_id: String,
    #[serde(rename = "user_id")]
    pub account_id: String,
    #[serde(rename = "soul_md")]
    pub behavior_spec: String,
    pub display_name: String,
    pub config: Value,
    /// The agent's integrations map with a `tokens` object merged in
    pub integrations: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProvisionResponse {
    pub container_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BalanceSync<'a> {
    pub user_id: &'a str,
    pub balance_cents: i64,
}

/// The fleet manager that starts and stops compute for agents
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Request compute for an agent and return its opaque compute pointer
    async fn provision(&self, request: &ProvisionRequest) -> Result<String>;

    /// Tear down an agent's compute. Unknown agents count as torn down.
    async fn deprovision(&self, agent_id: &str) -> Result<()>;

    /// Push an account's current balance to the fleet
    async fn sync_balance(&self, account_id: &str, balance_cents: i64) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FleetError::Timeout("slow".into()).is_transient());
        assert!(FleetError::Network("refused".into()).is_transient());
        assert!(FleetError::Server {
            status: 503,
            body: String::new()
        }
        .is_transient());

        assert!(!FleetError::Rejected {
            status: 422,
            body: String::new()
        }
        .is_transient());
        assert!(!FleetError::Unauthorized("bad secret".into()).is_transient());
        assert!(!FleetError::InvalidResponse("no container_id".into()).is_transient());
    }

    #[test]
    fn test_provision_request_wire_names() {
        let request = ProvisionRequest {
            agent_id: "a1".into(),
            account_id: "acc1".into(),
            behavior_spec: "Be helpful".into(),
            display_name: "Bot".into(),
            config: serde_json::json!({}),
            integrations: serde_json::json!({}),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["user_id"], "acc1");
        assert_eq!(json["soul_md"], "Be helpful");
        assert!(json.get("account_id").is_none());
    }
}
