// ABOUTME: Integration token store for connected channels
// ABOUTME: Keyed by (account, provider); read when provisioning an agent's compute

use agentbay_storage::{Result, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod storage;

pub use storage::SqliteTokenStore;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gmail,
    Slack,
    Telegram,
    Whatsapp,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Gmail,
        Provider::Slack,
        Provider::Telegram,
        Provider::Whatsapp,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Gmail => "gmail",
            Self::Slack => "slack",
            Self::Telegram => "telegram",
            Self::Whatsapp => "whatsapp",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gmail" => Ok(Self::Gmail),
            "slack" => Ok(Self::Slack),
            "telegram" => Ok(Self::Telegram),
            "whatsapp" => Ok(Self::Whatsapp),
            other => Err(StorageError::InvalidInput(format!(
                "unsupported integration provider '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntegrationToken {
    pub id: String,
    pub account_id: String,
    pub provider: Provider,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub agent_id: Option<String>,
    /// Human-readable identity such as the connected email or bot username
    pub identity: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Token fields supplied by a channel connector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewIntegrationToken {
    pub provider: Provider,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub identity: Option<String>,
}

/// What a client may see of a connection; never carries secrets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectedIntegration {
    pub provider: Provider,
    pub identity: Option<String>,
    pub agent_id: Option<String>,
    pub connected_at: DateTime<Utc>,
}

impl From<&IntegrationToken> for ConnectedIntegration {
    fn from(token: &IntegrationToken) -> Self {
        Self {
            provider: token.provider,
            identity: token.identity.clone(),
            agent_id: token.agent_id.clone(),
            connected_at: token.updated_at,
        }
    }
}

/// Keyed credential store populated by channel connectors
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// All tokens held for an account, ordered by provider
    async fn list_for_account(&self, account_id: &str) -> Result<Vec<IntegrationToken>>;

    /// Insert or replace the token for (account, provider)
    async fn upsert(&self, account_id: &str, token: NewIntegrationToken)
        -> Result<IntegrationToken>;

    /// Returns whether a token existed
    async fn delete(&self, account_id: &str, provider: Provider) -> Result<bool>;
}
