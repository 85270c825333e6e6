//! File tools — read, write, delete, and list through the executor.
//!
//! Each side-effecting tool declares its path as a gated operation so the
//! registry can consult the permission gate before dispatch.

use async_trait::async_trait;
use overseer_core::context::AgentContext;
use overseer_core::error::ToolError;
use overseer_core::executor::Executor;
use overseer_core::policy::PermissionRequest;
use overseer_core::tool::{ParamKind, Tool, ToolParameter, ToolResult, ToolSchema};
use std::sync::Arc;

fn path_schema(description: &str) -> ToolSchema {
    ToolSchema::new(vec![ToolParameter::required(
        "path",
        ParamKind::String,
        description,
    )])
}

fn path_arg(args: &serde_json::Value) -> Result<&str, ToolError> {
    args["path"]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))
}

/// Read a file's contents.
pub struct FileReadTool {
    executor: Arc<dyn Executor>,
}

impl FileReadTool {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path."
    }

    fn schema(&self) -> ToolSchema {
        path_schema("Path of the file to read")
    }

    fn token_cost(&self) -> u32 {
        60
    }

    fn permission_request(&self, args: &serde_json::Value) -> Option<PermissionRequest> {
        args["path"].as_str().map(PermissionRequest::file_read)
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        _context: &AgentContext,
    ) -> Result<ToolResult, ToolError> {
        let path = path_arg(&args)?;
        match self.executor.read_file(path).await {
            Ok(contents) => Ok(ToolResult::ok(contents)),
            Err(e) => Ok(ToolResult::fail(e.to_string())),
        }
    }
}

/// Write contents to a file, replacing it if it exists.
pub struct FileWriteTool {
    executor: Arc<dyn Executor>,
}

impl FileWriteTool {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write the given contents to a file, creating or replacing it."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(vec![
            ToolParameter::required("path", ParamKind::String, "Path of the file to write"),
            ToolParameter::required("contents", ParamKind::String, "Contents to write"),
        ])
    }

    fn token_cost(&self) -> u32 {
        80
    }

    fn permission_request(&self, args: &serde_json::Value) -> Option<PermissionRequest> {
        args["path"].as_str().map(PermissionRequest::file_write)
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        _context: &AgentContext,
    ) -> Result<ToolResult, ToolError> {
        let path = path_arg(&args)?;
        let contents = args["contents"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'contents' argument".into()))?;

        match self.executor.write_file(path, contents).await {
            Ok(()) => Ok(ToolResult::ok(format!(
                "Wrote {} bytes to {path}",
                contents.len()
            ))),
            Err(e) => Ok(ToolResult::fail(e.to_string())),
        }
    }
}

/// Delete a file.
pub struct FileDeleteTool {
    executor: Arc<dyn Executor>,
}

impl FileDeleteTool {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for FileDeleteTool {
    fn name(&self) -> &str {
        "file_delete"
    }

    fn description(&self) -> &str {
        "Delete the file at the given path."
    }

    fn schema(&self) -> ToolSchema {
        path_schema("Path of the file to delete")
    }

    fn token_cost(&self) -> u32 {
        60
    }

    fn permission_request(&self, args: &serde_json::Value) -> Option<PermissionRequest> {
        args["path"].as_str().map(PermissionRequest::file_delete)
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        _context: &AgentContext,
    ) -> Result<ToolResult, ToolError> {
        let path = path_arg(&args)?;
        match self.executor.delete_file(path).await {
            Ok(()) => Ok(ToolResult::ok(format!("Deleted {path}"))),
            Err(e) => Ok(ToolResult::fail(e.to_string())),
        }
    }
}

/// List the entries of a directory.
pub struct ListDirTool {
    executor: Arc<dyn Executor>,
}

impl ListDirTool {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the entries of a directory."
    }

    fn schema(&self) -> ToolSchema {
        path_schema("Path of the directory to list")
    }

    fn token_cost(&self) -> u32 {
        50
    }

    fn permission_request(&self, args: &serde_json::Value) -> Option<PermissionRequest> {
        args["path"].as_str().map(PermissionRequest::file_read)
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        _context: &AgentContext,
    ) -> Result<ToolResult, ToolError> {
        let path = path_arg(&args)?;
        match self.executor.list_dir(path).await {
            Ok(entries) => Ok(ToolResult::ok(entries.join("\n"))),
            Err(e) => Ok(ToolResult::fail(e.to_string())),
        }
    }
}
