//! Tool registry — registration, validation, gating, and dispatch.
//!
//! `execute` never raises across the registry boundary: unknown tools,
//! disabled tools, invalid arguments, permission denials, and collaborator
//! errors all come back as a failure `ToolResult` the agent can observe and
//! recover from. The only error `register` raises is a duplicate name,
//! which is API misuse.

use overseer_core::context::AgentContext;
use overseer_core::error::ToolError;
use overseer_core::tool::{Tool, ToolResult};
use overseer_security::PermissionGate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Holds tool definitions keyed by unique name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    gate: Option<Arc<PermissionGate>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            gate: None,
        }
    }

    /// Attach a permission gate. Tools that declare a `permission_request`
    /// are checked against it before every dispatch.
    pub fn with_gate(mut self, gate: Arc<PermissionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Register a tool. Name collisions are programmer errors and raise.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// All registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Sum of the static declared token cost of the (optionally filtered)
    /// tools. Used to decide which tools fit a context budget before they
    /// are even enabled.
    pub fn total_token_cost(&self, filter: Option<&[String]>) -> u64 {
        self.tools
            .values()
            .filter(|t| match filter {
                Some(names) => names.iter().any(|n| n == t.name()),
                None => true,
            })
            .map(|t| t.token_cost() as u64)
            .sum()
    }

    /// Execute a tool with the full enabled set.
    pub async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
        context: &AgentContext,
    ) -> ToolResult {
        self.execute_scoped(name, args, context, &[]).await
    }

    /// Execute a tool restricted to an agent's enabled set.
    ///
    /// An empty `enabled` slice means every registered tool is available.
    pub async fn execute_scoped(
        &self,
        name: &str,
        args: serde_json::Value,
        context: &AgentContext,
        enabled: &[String],
    ) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            return ToolResult::fail(ToolError::NotFound(name.to_string()).to_string());
        };

        if !enabled.is_empty() && !enabled.iter().any(|n| n == name) {
            return ToolResult::fail(format!("Tool '{name}' is not enabled for this agent"));
        }

        if let Err(e) = tool.schema().validate(&args) {
            return ToolResult::fail(format!("Invalid arguments for '{name}': {e}"));
        }

        if let Some(request) = tool.permission_request(&args) {
            if let Some(gate) = &self.gate {
                let decision = gate.check_permission(&request);
                if !decision.allowed {
                    warn!(tool = name, operation = %request.operation, reason = %decision.reason, "Tool blocked by permission gate");
                    return ToolResult::fail(format!(
                        "Permission denied for '{name}': {}",
                        decision.reason
                    ));
                }
            }
        }

        debug!(tool = name, agent = %context.agent_id, "Executing tool");
        let start = Instant::now();
        let outcome = tool.execute(args, context).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut result = match outcome {
            Ok(result) => result,
            // Collaborator breakage becomes a recoverable observation
            Err(e) => {
                warn!(tool = name, error = %e, "Tool execution failed");
                ToolResult::fail(format!("Tool '{name}' failed: {e}"))
            }
        };
        result
            .metadata
            .insert("duration_ms".into(), serde_json::json!(duration_ms));
        result
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
