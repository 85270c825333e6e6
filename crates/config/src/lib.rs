//! Configuration loading and validation for Overseer.
//!
//! Loads runtime configuration from a TOML file with serde defaults for
//! every field, so an empty file is a valid configuration. Validates all
//! ceilings at load time.

use overseer_core::policy::PermissionPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Hard safety ceilings enforced by the loop detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// Maximum agents live in one tree at once
    #[serde(default = "default_max_total_agents")]
    pub max_total_agents: usize,

    /// Maximum nesting depth of sub-agents
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,

    /// Maximum iterations of a sanctioned loop pattern
    #[serde(default = "default_max_loop_iterations")]
    pub max_loop_iterations: u32,

    /// Maximum concurrently nested sanctioned loops
    #[serde(default = "default_max_nested_loops")]
    pub max_nested_loops: u32,
}

fn default_max_total_agents() -> usize {
    50
}
fn default_max_nesting_depth() -> usize {
    10
}
fn default_max_loop_iterations() -> u32 {
    10
}
fn default_max_nested_loops() -> u32 {
    3
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_total_agents: default_max_total_agents(),
            max_nesting_depth: default_max_nesting_depth(),
            max_loop_iterations: default_max_loop_iterations(),
            max_nested_loops: default_max_nested_loops(),
        }
    }
}

/// Orchestrator tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Bounded concurrency for `execute_parallel`
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

fn default_max_parallel() -> usize {
    4
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
        }
    }
}

/// The root runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    #[serde(default)]
    pub limits: SafetyLimits,

    #[serde(default)]
    pub permissions: PermissionPolicy,
}

impl RuntimeConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "Loaded runtime config");
        Self::from_toml_str(&raw)
    }

    /// Reject configurations that would make the safety gates vacuous.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.max_parallel == 0 {
            return Err(ConfigError::Invalid(
                "orchestrator.max_parallel must be at least 1".into(),
            ));
        }
        if self.limits.max_total_agents == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_total_agents must be at least 1".into(),
            ));
        }
        if self.limits.max_nesting_depth == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_nesting_depth must be at least 1".into(),
            ));
        }
        if self.limits.max_loop_iterations == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_loop_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overseer_core::policy::RiskLevel;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config.orchestrator.max_parallel, 4);
        assert_eq!(config.limits.max_total_agents, 50);
        assert_eq!(config.limits.max_nesting_depth, 10);
        assert_eq!(config.limits.max_loop_iterations, 10);
        assert_eq!(config.limits.max_nested_loops, 3);
        assert!(!config.permissions.auto_accept);
    }

    #[test]
    fn partial_config_overrides() {
        let raw = r#"
            [orchestrator]
            max_parallel = 8

            [limits]
            max_nesting_depth = 4

            [permissions]
            auto_accept = true
            accept_risk_level = "medium"
            blocklist = ["rm -rf"]
        "#;
        let config = RuntimeConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.orchestrator.max_parallel, 8);
        assert_eq!(config.limits.max_nesting_depth, 4);
        // Untouched fields keep defaults
        assert_eq!(config.limits.max_total_agents, 50);
        assert!(config.permissions.auto_accept);
        assert_eq!(config.permissions.accept_risk_level, RiskLevel::Medium);
        assert_eq!(config.permissions.blocklist, vec!["rm -rf".to_string()]);
    }

    #[test]
    fn zero_ceilings_rejected() {
        let raw = "[limits]\nmax_total_agents = 0\n";
        assert!(matches!(
            RuntimeConfig::from_toml_str(raw),
            Err(ConfigError::Invalid(_))
        ));

        let raw = "[orchestrator]\nmax_parallel = 0\n";
        assert!(matches!(
            RuntimeConfig::from_toml_str(raw),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_toml_rejected() {
        assert!(matches!(
            RuntimeConfig::from_toml_str("not [valid toml"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[orchestrator]\nmax_parallel = 2").unwrap();

        let config = RuntimeConfig::load(file.path()).unwrap();
        assert_eq!(config.orchestrator.max_parallel, 2);
    }

    #[test]
    fn load_missing_file_errors() {
        let result = RuntimeConfig::load("/nonexistent/overseer.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
