//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give an agent the ability to act in the world: execute
//! shell commands, read/write files, delegate to sub-agents, etc. Each tool
//! declares a typed parameter set up front; the registry validates arguments
//! before dispatch and expected failures come back as a failure `ToolResult`
//! rather than an error.

use crate::context::AgentContext;
use crate::error::ToolError;
use crate::policy::PermissionRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The type a tool parameter must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamKind {
    fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Object => value.is_object(),
            ParamKind::Array => value.is_array(),
        }
    }
}

/// One declared, named, typed tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: String,
}

impl ToolParameter {
    pub fn required(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: description.into(),
        }
    }
}

/// The declared argument schema of a tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolSchema {
    pub parameters: Vec<ToolParameter>,
}

impl ToolSchema {
    pub fn new(parameters: Vec<ToolParameter>) -> Self {
        Self { parameters }
    }

    /// Validate a JSON argument object against the declared parameters.
    ///
    /// Arguments must be a JSON object; every required parameter must be
    /// present; every present declared parameter must have the declared type.
    /// Undeclared extra fields are ignored.
    pub fn validate(&self, args: &serde_json::Value) -> std::result::Result<(), String> {
        let Some(map) = args.as_object() else {
            return Err("arguments must be a JSON object".into());
        };

        for param in &self.parameters {
            match map.get(&param.name) {
                Some(value) => {
                    if !param.kind.matches(value) {
                        return Err(format!(
                            "parameter '{}' has wrong type (expected {:?})",
                            param.name, param.kind
                        ));
                    }
                }
                None if param.required => {
                    return Err(format!("missing required parameter '{}'", param.name));
                }
                None => {}
            }
        }
        Ok(())
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            output: String::new(),
            error: Some(error),
            metadata: serde_json::Map::new(),
        }
    }
}

/// The core Tool trait.
///
/// Each tool (shell, file_read, file_write, spawn_agent, etc.) implements
/// this trait. Tools are registered in the `ToolRegistry` and dispatched by
/// the agent step loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g. "shell", "file_write").
    fn name(&self) -> &str;

    /// What this tool does (forwarded to the reasoner).
    fn description(&self) -> &str;

    /// The declared argument schema.
    fn schema(&self) -> ToolSchema;

    /// Static declared token cost of advertising this tool to the reasoner.
    fn token_cost(&self) -> u32 {
        0
    }

    /// The privileged operation these arguments would perform, if any.
    ///
    /// Side-effecting tools return `Some`; the registry gates the returned
    /// request through the permission gate before dispatch. Pure tools
    /// return `None` and skip the gate.
    fn permission_request(&self, _args: &serde_json::Value) -> Option<PermissionRequest> {
        None
    }

    /// Execute the tool with validated arguments.
    ///
    /// Expected failure modes (file missing, command non-zero, …) come back
    /// as `ToolResult::fail`; `Err` is reserved for collaborator breakage.
    async fn execute(
        &self,
        args: serde_json::Value,
        context: &AgentContext,
    ) -> std::result::Result<ToolResult, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ToolSchema {
        ToolSchema::new(vec![
            ToolParameter::required("command", ParamKind::String, "command to run"),
            ToolParameter::optional("timeout_secs", ParamKind::Number, "timeout"),
        ])
    }

    #[test]
    fn validate_accepts_complete_args() {
        let args = serde_json::json!({"command": "ls", "timeout_secs": 5});
        assert!(schema().validate(&args).is_ok());
    }

    #[test]
    fn validate_accepts_missing_optional() {
        let args = serde_json::json!({"command": "ls"});
        assert!(schema().validate(&args).is_ok());
    }

    #[test]
    fn validate_rejects_missing_required() {
        let args = serde_json::json!({"timeout_secs": 5});
        let err = schema().validate(&args).unwrap_err();
        assert!(err.contains("command"));
    }

    #[test]
    fn validate_rejects_wrong_type() {
        let args = serde_json::json!({"command": 42});
        let err = schema().validate(&args).unwrap_err();
        assert!(err.contains("wrong type"));
    }

    #[test]
    fn validate_rejects_non_object() {
        let err = schema().validate(&serde_json::json!("ls")).unwrap_err();
        assert!(err.contains("object"));
    }

    #[test]
    fn result_constructors() {
        let ok = ToolResult::ok("done");
        assert!(ok.success);
        assert!(ok.error.is_none());

        let fail = ToolResult::fail("no such file");
        assert!(!fail.success);
        assert_eq!(fail.error.as_deref(), Some("no such file"));
    }
}
