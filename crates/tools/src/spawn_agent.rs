//! Sub-agent delegation tool.
//!
//! Delegates a sub-task to a fresh agent through the `AgentSpawner` trait —
//! the tool never sees orchestrator internals. A denied spawn (loop or
//! safety limit) is an ordinary failure observation, not an error.

use async_trait::async_trait;
use overseer_core::agent::AgentConfig;
use overseer_core::context::AgentContext;
use overseer_core::error::ToolError;
use overseer_core::spawner::AgentSpawner;
use overseer_core::tool::{ParamKind, Tool, ToolParameter, ToolResult, ToolSchema};
use std::sync::Arc;
use tracing::debug;

/// Spawn a sub-agent for a delegated task.
pub struct SpawnAgentTool {
    spawner: Arc<dyn AgentSpawner>,
}

impl SpawnAgentTool {
    pub fn new(spawner: Arc<dyn AgentSpawner>) -> Self {
        Self { spawner }
    }
}

#[async_trait]
impl Tool for SpawnAgentTool {
    fn name(&self) -> &str {
        "spawn_agent"
    }

    fn description(&self) -> &str {
        "Delegate a sub-task to a new agent. Set wait=false to run it in the background and poll later."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(vec![
            ToolParameter::required("task", ParamKind::String, "The sub-task to delegate"),
            ToolParameter::optional("role", ParamKind::String, "Role of the sub-agent"),
            ToolParameter::optional(
                "wait",
                ParamKind::Boolean,
                "Wait for the sub-agent to finish (default true)",
            ),
        ])
    }

    fn token_cost(&self) -> u32 {
        150
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        context: &AgentContext,
    ) -> Result<ToolResult, ToolError> {
        let task = args["task"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'task' argument".into()))?;
        let role = args["role"].as_str().unwrap_or("worker");
        let wait = args["wait"].as_bool().unwrap_or(true);

        let config = AgentConfig::new(format!("sub-agent ({role})"), role);

        debug!(parent = %context.agent_id, role, wait, "Delegating to sub-agent");

        let agent_id = match self.spawner.spawn(task, config).await {
            Ok(id) => id,
            // Loop/safety denial: recoverable observation
            Err(e) => return Ok(ToolResult::fail(e.to_string())),
        };

        if !wait {
            let mut result = ToolResult::ok(format!("Spawned background agent {agent_id}"));
            result
                .metadata
                .insert("agent_id".into(), serde_json::json!(agent_id));
            return Ok(result);
        }

        match self.spawner.get_result(&agent_id).await {
            Ok(agent_result) => {
                let mut result = if agent_result.success {
                    ToolResult::ok(agent_result.response.unwrap_or_default())
                } else {
                    ToolResult::fail(
                        agent_result
                            .error
                            .unwrap_or_else(|| "sub-agent failed".into()),
                    )
                };
                result
                    .metadata
                    .insert("agent_id".into(), serde_json::json!(agent_id));
                result.metadata.insert(
                    "total_tokens".into(),
                    serde_json::json!(agent_result.total_tokens),
                );
                Ok(result)
            }
            Err(e) => Ok(ToolResult::fail(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overseer_core::agent::{AgentResult, AgentStatus};
    use overseer_core::error::OrchestratorError;

    /// Spawner stub that either succeeds with a canned result or denies.
    struct StubSpawner {
        deny: bool,
    }

    #[async_trait]
    impl AgentSpawner for StubSpawner {
        async fn spawn(
            &self,
            _task: &str,
            _config: AgentConfig,
        ) -> Result<String, OrchestratorError> {
            if self.deny {
                Err(OrchestratorError::LoopLimitExceeded(
                    "accidental infinite loop".into(),
                ))
            } else {
                Ok("agent-1".into())
            }
        }

        async fn get_result(&self, _agent_id: &str) -> Result<AgentResult, OrchestratorError> {
            Ok(AgentResult {
                success: true,
                status: AgentStatus::Completed,
                steps: vec![],
                response: Some("sub-task done".into()),
                error: None,
                total_tokens: 42,
                total_cost: 0.01,
                duration_ms: 5,
            })
        }

        async fn check_result(
            &self,
            _agent_id: &str,
        ) -> Result<Option<AgentResult>, OrchestratorError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn delegation_returns_sub_agent_response() {
        let tool = SpawnAgentTool::new(Arc::new(StubSpawner { deny: false }));
        let result = tool
            .execute(
                serde_json::json!({"task": "summarize", "role": "summarizer"}),
                &AgentContext::root("parent"),
            )
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "sub-task done");
        assert_eq!(result.metadata["agent_id"], serde_json::json!("agent-1"));
    }

    #[tokio::test]
    async fn denied_spawn_is_failure_observation() {
        let tool = SpawnAgentTool::new(Arc::new(StubSpawner { deny: true }));
        let result = tool
            .execute(
                serde_json::json!({"task": "loop forever"}),
                &AgentContext::root("parent"),
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("loop"));
    }

    #[tokio::test]
    async fn background_spawn_returns_immediately() {
        let tool = SpawnAgentTool::new(Arc::new(StubSpawner { deny: false }));
        let result = tool
            .execute(
                serde_json::json!({"task": "long job", "wait": false}),
                &AgentContext::root("parent"),
            )
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("background"));
    }
}
