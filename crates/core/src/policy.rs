//! Permission and risk-assessment domain types.
//!
//! The assessment and gating logic lives in `overseer-security`; this module
//! defines the shared vocabulary so that tools, the registry, and the gate
//! can exchange requests without depending on the security crate.

use serde::{Deserialize, Serialize};

/// Severity of a privileged operation. Ordered: Low < Medium < High < Critical.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// The classification produced for one operation string.
///
/// `score` is the maximum across all matched rules, never a sum — any one
/// severe match is enough to reach `Critical`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub reasons: Vec<String>,
    /// 0–100
    pub score: u8,
}

/// The kind of privileged operation being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    ShellCommand,
    FileRead,
    FileWrite,
    FileDelete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationKind::ShellCommand => "shell_command",
            OperationKind::FileRead => "file_read",
            OperationKind::FileWrite => "file_write",
            OperationKind::FileDelete => "file_delete",
        };
        f.write_str(s)
    }
}

/// A request to perform a privileged operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub kind: OperationKind,
    /// The literal command or path
    pub operation: String,
}

impl PermissionRequest {
    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::ShellCommand,
            operation: command.into(),
        }
    }

    pub fn file_read(path: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::FileRead,
            operation: path.into(),
        }
    }

    pub fn file_write(path: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::FileWrite,
            operation: path.into(),
        }
    }

    pub fn file_delete(path: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::FileDelete,
            operation: path.into(),
        }
    }
}

/// The gate's decision for one request, with the full assessment for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionResult {
    pub allowed: bool,
    pub reason: String,
    pub risk_level: RiskLevel,
    pub assessment: RiskAssessment,
}

/// Allow/block lists and the auto-accept threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionPolicy {
    /// Whether operations at or below `accept_risk_level` are auto-accepted
    #[serde(default)]
    pub auto_accept: bool,

    /// Highest risk level that auto-accept will allow
    #[serde(default)]
    pub accept_risk_level: RiskLevel,

    /// Operations matching any entry are always allowed
    #[serde(default)]
    pub allowlist: Vec<String>,

    /// Operations matching any entry are always denied
    #[serde(default)]
    pub blocklist: Vec<String>,
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self {
            auto_accept: false,
            accept_risk_level: RiskLevel::Low,
            allowlist: Vec::new(),
            blocklist: Vec::new(),
        }
    }
}

/// A live source of permission policy.
///
/// Read at check time, not at construction time, so policy updates take
/// effect immediately.
pub trait PolicySource: Send + Sync {
    fn current(&self) -> PermissionPolicy;
}

/// A fixed policy that never changes. Useful for tests and simple setups.
#[derive(Debug, Clone)]
pub struct StaticPolicy(pub PermissionPolicy);

impl PolicySource for StaticPolicy {
    fn current(&self) -> PermissionPolicy {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn risk_level_serializes_snake_case() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }

    #[test]
    fn request_constructors_set_kind() {
        assert_eq!(
            PermissionRequest::shell("ls").kind,
            OperationKind::ShellCommand
        );
        assert_eq!(
            PermissionRequest::file_delete("/tmp/x").kind,
            OperationKind::FileDelete
        );
    }

    #[test]
    fn default_policy_is_closed() {
        let policy = PermissionPolicy::default();
        assert!(!policy.auto_accept);
        assert_eq!(policy.accept_risk_level, RiskLevel::Low);
        assert!(policy.allowlist.is_empty());
        assert!(policy.blocklist.is_empty());
    }
}
