//! Local executor — tokio-backed process and filesystem access.
//!
//! The reference `Executor` implementation for running on the host machine.
//! Sandboxed or remote executors implement the same trait.

use async_trait::async_trait;
use overseer_core::error::ExecError;
use overseer_core::executor::{ExecOptions, ExecOutput, Executor};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs commands and file operations directly on the host.
pub struct LocalExecutor {
    /// Default working directory for commands, if set
    workdir: Option<PathBuf>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self { workdir: None }
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, command: &str, options: &ExecOptions) -> Result<ExecOutput, ExecError> {
        debug!(command = %command, "Executing command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };

        if let Some(cwd) = options.cwd.as_deref().map(PathBuf::from).or_else(|| self.workdir.clone()) {
            cmd.current_dir(cwd);
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        let output = match options.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), cmd.output())
                .await
                .map_err(|_| ExecError::CommandFailed(format!("timed out after {secs}s")))?,
            None => cmd.output().await,
        }
        .map_err(|e| ExecError::CommandFailed(e.to_string()))?;

        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn read_file(&self, path: &str) -> Result<String, ExecError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ExecError::FileOperation {
                path: path.into(),
                reason: e.to_string(),
            })
    }

    async fn write_file(&self, path: &str, contents: &str) -> Result<(), ExecError> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| ExecError::FileOperation {
                path: path.into(),
                reason: e.to_string(),
            })
    }

    async fn exists(&self, path: &str) -> Result<bool, ExecError> {
        Ok(tokio::fs::try_exists(path).await.unwrap_or(false))
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>, ExecError> {
        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| ExecError::FileOperation {
                path: path.into(),
                reason: e.to_string(),
            })?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ExecError::FileOperation {
                path: path.into(),
                reason: e.to_string(),
            })?
        {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    async fn delete_file(&self, path: &str) -> Result<(), ExecError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| ExecError::FileOperation {
                path: path.into(),
                reason: e.to_string(),
            })
    }
}
