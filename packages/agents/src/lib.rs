// ABOUTME: Agent registry and lifecycle state machine for Agentbay
// ABOUTME: Persists agents and drives create, pause, resume, update and delete

pub mod manager;
pub mod storage;
pub mod types;

pub use manager::{AgentManager, ManagerError, Result, STARTER_CREDITS_DESCRIPTION};
pub use storage::AgentStorage;
pub use types::{Agent, AgentStatus, CreateAgentOutcome, CreateAgentRequest, UpdateAgentRequest};
