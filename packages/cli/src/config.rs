// ABOUTME: Server configuration loaded from environment variables
// ABOUTME: Defaults, required fleet manager settings and validation errors

use std::env;
use std::num::ParseIntError;
use std::time::Duration;
use thiserror::Error;

use agentbay_core::agentbay_dir;

pub const DEFAULT_PORT: u16 = 4010;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_ORCHESTRATOR_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DEPROVISION_RETRIES: u32 = 2;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid number in {name}: {source}")]
    InvalidNumber {
        name: &'static str,
        #[source]
        source: ParseIntError,
    },
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub orchestrator_url: String,
    pub orchestrator_secret: String,
    /// Secret presented by the usage reporter and other internal callers
    pub internal_secret: String,
    pub orchestrator_timeout: Duration,
    pub deprovision_retries: u32,
    pub cors_origin: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Database location alone, for commands that never reach the fleet manager
    pub fn database_url_from_env() -> String {
        env::var("AGENTBAY_DATABASE_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(default_database_url)
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|source| ConfigError::InvalidNumber {
                    name: "PORT",
                    source,
                })?,
            None => DEFAULT_PORT,
        };
        let port = validate_port(port)?;

        let database_url = get("AGENTBAY_DATABASE_URL").unwrap_or_else(default_database_url);
        let orchestrator_url =
            get("ORCHESTRATOR_URL").ok_or(ConfigError::Missing("ORCHESTRATOR_URL"))?;
        let orchestrator_secret =
            get("ORCHESTRATOR_SECRET").ok_or(ConfigError::Missing("ORCHESTRATOR_SECRET"))?;
        let internal_secret =
            get("USAGE_CALLBACK_SECRET").unwrap_or_else(|| orchestrator_secret.clone());

        let timeout_secs = match get("ORCHESTRATOR_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|source| ConfigError::InvalidNumber {
                    name: "ORCHESTRATOR_TIMEOUT_SECS",
                    source,
                })?,
            None => DEFAULT_ORCHESTRATOR_TIMEOUT_SECS,
        };

        let deprovision_retries = match get("DEPROVISION_RETRIES") {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|source| ConfigError::InvalidNumber {
                    name: "DEPROVISION_RETRIES",
                    source,
                })?,
            None => DEFAULT_DEPROVISION_RETRIES,
        };

        let cors_origin = get("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());

        Ok(Config {
            port,
            database_url,
            orchestrator_url,
            orchestrator_secret,
            internal_secret,
            orchestrator_timeout: Duration::from_secs(timeout_secs),
            deprovision_retries,
            cors_origin,
        })
    }

    /// Replace the listening port, applying the same range check as `PORT`
    pub fn with_port(mut self, port: u16) -> Result<Self, ConfigError> {
        self.port = validate_port(port)?;
        Ok(self)
    }
}

fn validate_port(port: u16) -> Result<u16, ConfigError> {
    if port == 0 {
        return Err(ConfigError::PortOutOfRange(port));
    }
    Ok(port)
}

fn default_database_url() -> String {
    format!(
        "sqlite://{}",
        agentbay_dir().join("agentbay.db").to_string_lossy()
    )
}
