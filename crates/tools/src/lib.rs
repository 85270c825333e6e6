//! # Overseer Tools
//!
//! The tool registry and the built-in tools: shell execution, file
//! operations, and sub-agent delegation. All side effects go through the
//! injected `Executor`; privileged tools are gated by the `PermissionGate`
//! at dispatch time.

pub mod file_ops;
pub mod local_exec;
pub mod registry;
pub mod shell;
pub mod spawn_agent;

pub use file_ops::{FileDeleteTool, FileReadTool, FileWriteTool, ListDirTool};
pub use local_exec::LocalExecutor;
pub use registry::ToolRegistry;
pub use shell::ShellTool;
pub use spawn_agent::SpawnAgentTool;
