//! AgentSpawner trait — sub-agent delegation without orchestrator internals.
//!
//! The orchestrator implements this; the `spawn_agent` tool consumes it.
//! This is the whole surface a "delegate to sub-agent" capability needs.

use crate::agent::{AgentConfig, AgentResult};
use crate::error::OrchestratorError;
use async_trait::async_trait;

/// Spawn sub-agents and observe their completion.
#[async_trait]
pub trait AgentSpawner: Send + Sync {
    /// Spawn a sub-agent for `task` and start it in the background.
    /// Returns the new agent's id, or an error if the loop detector denied
    /// the spawn.
    async fn spawn(&self, task: &str, config: AgentConfig) -> Result<String, OrchestratorError>;

    /// Block until the agent reaches a terminal state and return its result.
    async fn get_result(&self, agent_id: &str) -> Result<AgentResult, OrchestratorError>;

    /// Non-blocking check: `None` while the agent is still running.
    async fn check_result(
        &self,
        agent_id: &str,
    ) -> Result<Option<AgentResult>, OrchestratorError>;
}
