//! Executor trait — the side-effect boundary.
//!
//! The core never spawns processes or touches disk directly; every shell
//! command and file operation goes through an injected `Executor`. A local
//! implementation lives in `overseer-tools`; sandboxed or remote executors
//! plug in the same way.

use crate::error::ExecError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Options for one command execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecOptions {
    /// Working directory, if different from the executor's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Per-command timeout. This is the executor's concern; the agent's
    /// budgets are checked at step boundaries, not mid-command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Extra environment variables
    #[serde(default)]
    pub env: Vec<(String, String)>,
}

/// Captured output of one command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The narrow interface the runtime consumes for all side effects.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Acquire scoped resources for a whole agent run.
    async fn initialize(&self) -> Result<(), ExecError> {
        Ok(())
    }

    /// Release resources acquired by `initialize`.
    async fn cleanup(&self) -> Result<(), ExecError> {
        Ok(())
    }

    async fn execute(&self, command: &str, options: &ExecOptions) -> Result<ExecOutput, ExecError>;

    async fn read_file(&self, path: &str) -> Result<String, ExecError>;

    async fn write_file(&self, path: &str, contents: &str) -> Result<(), ExecError>;

    async fn exists(&self, path: &str) -> Result<bool, ExecError>;

    async fn list_dir(&self, path: &str) -> Result<Vec<String>, ExecError>;

    async fn delete_file(&self, path: &str) -> Result<(), ExecError>;
}
