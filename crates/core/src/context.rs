//! Execution context for one agent instance.
//!
//! Every spawned agent gets a fresh, isolated context: its own session
//! identity, no inherited message history. The parent link and depth exist
//! for loop detection and monitoring, not for data sharing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The isolated context handed to an agent at spawn time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    /// Unique id of the agent this context belongs to
    pub agent_id: String,

    /// Fresh conversation/session identity, distinct from the parent's
    pub session_id: String,

    /// The task this agent was spawned to perform
    pub task: String,

    /// Parent agent id, if this is a sub-agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Nesting depth in the agent tree (root = 0)
    #[serde(default)]
    pub depth: u32,

    /// Free-form key/value scratch space for tools
    #[serde(default)]
    pub variables: serde_json::Map<String, serde_json::Value>,
}

impl AgentContext {
    /// Create a root context for a top-level agent.
    pub fn root(task: impl Into<String>) -> Self {
        Self {
            agent_id: Uuid::new_v4().to_string(),
            session_id: Uuid::new_v4().to_string(),
            task: task.into(),
            parent_id: None,
            depth: 0,
            variables: serde_json::Map::new(),
        }
    }

    /// Derive an isolated child context.
    ///
    /// The child gets a fresh agent and session id and does not inherit the
    /// parent's history — only the parent link and depth carry over.
    pub fn child(&self, task: impl Into<String>) -> Self {
        Self {
            agent_id: Uuid::new_v4().to_string(),
            session_id: Uuid::new_v4().to_string(),
            task: task.into(),
            parent_id: Some(self.agent_id.clone()),
            depth: self.depth + 1,
            variables: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_context_has_no_parent() {
        let ctx = AgentContext::root("do the thing");
        assert!(ctx.parent_id.is_none());
        assert_eq!(ctx.depth, 0);
        assert_eq!(ctx.task, "do the thing");
    }

    #[test]
    fn child_context_is_isolated() {
        let mut parent = AgentContext::root("parent task");
        parent
            .variables
            .insert("secret".into(), serde_json::json!("value"));

        let child = parent.child("child task");
        assert_eq!(child.parent_id.as_deref(), Some(parent.agent_id.as_str()));
        assert_eq!(child.depth, 1);
        assert_ne!(child.session_id, parent.session_id);
        assert_ne!(child.agent_id, parent.agent_id);
        // No inherited state
        assert!(child.variables.is_empty());
    }
}
