// ABOUTME: Fleet manager integration for Agentbay
// ABOUTME: Orchestrator trait, its HTTP client and the provisioning reconciler

pub mod http;
pub mod orchestrator;
pub mod reconciler;

pub use http::{HttpOrchestrator, OrchestratorConfig};
pub use orchestrator::{FleetError, Orchestrator, ProvisionRequest, Result};
pub use reconciler::{ProvisionTarget, ReconcileOutcome, Reconciler};
