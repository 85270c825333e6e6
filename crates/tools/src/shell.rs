//! Shell tool — execute system commands through the injected executor.

use async_trait::async_trait;
use overseer_core::context::AgentContext;
use overseer_core::error::ToolError;
use overseer_core::executor::{ExecOptions, Executor};
use overseer_core::policy::PermissionRequest;
use overseer_core::tool::{ParamKind, Tool, ToolParameter, ToolResult, ToolSchema};
use std::sync::Arc;

/// Execute a shell command and return its output.
///
/// Every invocation is gated: the registry submits the literal command to
/// the permission gate before dispatch.
pub struct ShellTool {
    executor: Arc<dyn Executor>,
}

impl ShellTool {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr. Use this for running programs, checking files, git operations, etc."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(vec![
            ToolParameter::required("command", ParamKind::String, "The shell command to execute"),
            ToolParameter::optional("cwd", ParamKind::String, "Working directory"),
            ToolParameter::optional("timeout_secs", ParamKind::Number, "Command timeout in seconds"),
        ])
    }

    fn token_cost(&self) -> u32 {
        120
    }

    fn permission_request(&self, args: &serde_json::Value) -> Option<PermissionRequest> {
        args["command"].as_str().map(PermissionRequest::shell)
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        _context: &AgentContext,
    ) -> Result<ToolResult, ToolError> {
        let command = args["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        let options = ExecOptions {
            cwd: args["cwd"].as_str().map(String::from),
            timeout_secs: args["timeout_secs"].as_u64(),
            env: Vec::new(),
        };

        let output = match self.executor.execute(command, &options).await {
            Ok(output) => output,
            Err(e) => return Ok(ToolResult::fail(e.to_string())),
        };

        let mut result = if output.success() {
            let text = if output.stderr.is_empty() {
                output.stdout.clone()
            } else {
                format!("{}\n[stderr]: {}", output.stdout, output.stderr)
            };
            ToolResult::ok(text.trim())
        } else {
            let mut r = ToolResult::fail(format!("exit code {}", output.exit_code));
            r.output = format!("{}\n{}", output.stdout, output.stderr)
                .trim()
                .to_string();
            r
        };
        result
            .metadata
            .insert("exit_code".into(), serde_json::json!(output.exit_code));
        Ok(result)
    }
}
