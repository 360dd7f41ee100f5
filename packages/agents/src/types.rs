// ABOUTME: Agent type definitions
// ABOUTME: Agent records, lifecycle status and the create/update request shapes

use agentbay_storage::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Row exists, compute not yet requested or confirmed
    Pending,
    /// Compute request in flight
    Provisioning,
    /// Compute confirmed running
    Active,
    /// Compute intentionally released
    Paused,
    /// Compute request errored; resume retries
    Failed,
}

impl AgentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Provisioning => "provisioning",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, StorageError> {
        match s {
            "pending" => Ok(Self::Pending),
            "provisioning" => Ok(Self::Provisioning),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "failed" => Ok(Self::Failed),
            _ => Err(StorageError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: String,
    pub account_id: String,
    pub template_id: String,
    pub display_name: String,
    /// Free-text behavior document the agent runs with
    pub behavior_spec: String,
    pub config: Value,
    pub integrations: Value,
    /// Opaque pointer to backing compute; present exactly when active
    pub compute_id: Option<String>,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Whether the fleet may be running something for this agent. A provision
    /// that timed out can leave compute behind without a recorded pointer.
    pub fn may_hold_compute(&self) -> bool {
        self.compute_id.is_some()
            || matches!(
                self.status,
                AgentStatus::Pending | AgentStatus::Provisioning | AgentStatus::Failed
            )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAgentRequest {
    #[serde(default, alias = "template")]
    pub template_id: Option<String>,
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
    #[serde(default, alias = "soul_md")]
    pub behavior_spec: Option<String>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub integrations: Option<Value>,
}

/// Whitelisted patch; fields outside this struct are ignored
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAgentRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, alias = "soul_md")]
    pub behavior_spec: Option<String>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub integrations: Option<Value>,
    #[serde(default)]
    pub status: Option<AgentStatus>,
}

impl UpdateAgentRequest {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.behavior_spec.is_none()
            && self.config.is_none()
            && self.integrations.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAgentOutcome {
    pub agent: Agent,
    pub balance_cents: i64,
    /// Set when the agent exists but its compute is not running yet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
}
