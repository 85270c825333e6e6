//! Error types for the Overseer domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for all Overseer operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Loop detection error: {0}")]
    Loop(#[from] LoopError),

    #[error("Orchestration error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("Executor error: {0}")]
    Exec(#[from] ExecError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum AgentError {
    /// A budget ceiling was hit before the step could start.
    /// Distinguishable from tool-level failures so the orchestrator can
    /// report it separately.
    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Agent is already running")]
    AlreadyRunning,

    #[error("Reasoner failed: {0}")]
    Reasoner(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Permission denied: {tool_name} — {reason}")]
    PermissionDenied { tool_name: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum LoopError {
    #[error("Loop limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Infinite loop detected: {0}")]
    LoopDetected(String),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A spawn was denied by the loop detector. The sub-agent is never
    /// created in this case.
    #[error("Spawn denied: {0}")]
    LoopLimitExceeded(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Agent {agent_id} failed: {reason}")]
    AgentFailed { agent_id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("File operation failed on {path}: {reason}")]
    FileOperation { path: String, reason: String },

    #[error("Executor not initialized")]
    NotInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_error_displays_reason() {
        let err = Error::Agent(AgentError::BudgetExceeded(
            "max_iterations (10) reached".into(),
        ));
        assert!(err.to_string().contains("Budget exceeded"));
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn spawn_denial_displays_correctly() {
        let err = Error::Orchestrator(OrchestratorError::LoopLimitExceeded(
            "accidental infinite loop: [finder, thinker]".into(),
        ));
        assert!(err.to_string().contains("Spawn denied"));
        assert!(err.to_string().contains("finder"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::PermissionDenied {
            tool_name: "shell".into(),
            reason: "requires approval".into(),
        });
        assert!(err.to_string().contains("shell"));
        assert!(err.to_string().contains("requires approval"));
    }
}
