// ABOUTME: HTTP client for the fleet manager API
// ABOUTME: Bearer-authenticated JSON calls, every request bounded by the client timeout

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::orchestrator::{
    BalanceSync, FleetError, Orchestrator, ProvisionRequest, ProvisionResponse, Result,
};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub base_url: String,
    pub secret: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct HttpOrchestrator {
    http_client: Client,
    base_url: String,
    secret: String,
}

impl HttpOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(FleetError::Configuration(
                "fleet manager URL is empty".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FleetError::Configuration(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret: config.secret,
        })
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret)
    }

    async fn post<B>(&self, path: &str, body: Option<&B>) -> Result<Response>
    where
        B: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let mut request = self
            .http_client
            .post(&url)
            .header("Authorization", self.auth_header());
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(map_transport_error)
    }
}

#[async_trait]
impl Orchestrator for HttpOrchestrator {
    async fn provision(&self, request: &ProvisionRequest) -> Result<String> {
        let response = self.post("/api/agents/provision", Some(request)).await?;
        let response = check_status(response).await?;

        let body: ProvisionResponse = response
            .json()
            .await
            .map_err(|e| FleetError::InvalidResponse(e.to_string()))?;

        body.container_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| FleetError::InvalidResponse("missing container_id".to_string()))
    }

    async fn deprovision(&self, agent_id: &str) -> Result<()> {
        let path = format!("/api/agents/{}/deprovision", agent_id);
        let response = self.post::<()>(&path, None).await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(agent_id = %agent_id, "Fleet manager has no compute for agent");
            return Ok(());
        }

        check_status(response).await.map(|_| ())
    }

    async fn sync_balance(&self, account_id: &str, balance_cents: i64) -> Result<()> {
        let body = BalanceSync {
            user_id: account_id,
            balance_cents,
        };
        let response = self.post("/api/credits/set", Some(&body)).await?;

        check_status(response).await.map(|_| ())
    }
}

fn map_transport_error(e: reqwest::Error) -> FleetError {
    if e.is_timeout() {
        FleetError::Timeout(e.to_string())
    } else {
        FleetError::Network(e.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FleetError::Unauthorized(body)),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => Err(FleetError::Server {
            status: status.as_u16(),
            body,
        }),
        s if s.is_server_error() => Err(FleetError::Server {
            status: s.as_u16(),
            body,
        }),
        s => Err(FleetError::Rejected {
            status: s.as_u16(),
            body,
        }),
    }
}
