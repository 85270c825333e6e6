//! Permission gate — allow/deny/needs-approval decisions.
//!
//! Priority order, first match wins:
//! 1. blocklist match → deny, regardless of computed risk or auto-accept
//! 2. allowlist match → allow, regardless of computed risk
//! 3. auto-accept enabled and risk at or below the threshold → allow
//! 4. otherwise → deny, "requires approval" (the surrounding system prompts
//!    a human and re-submits as an allowlist entry)
//!
//! Every branch writes exactly one audit entry before returning.

use crate::audit::{AuditLogEntry, AuditLogger};
use crate::risk::RiskAssessor;
use chrono::Utc;
use overseer_core::policy::{
    PermissionPolicy, PermissionRequest, PermissionResult, PolicySource,
};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Decides whether a privileged operation may proceed.
pub struct PermissionGate {
    policy: Arc<dyn PolicySource>,
    audit: Arc<AuditLogger>,
}

impl PermissionGate {
    pub fn new(policy: Arc<dyn PolicySource>, audit: Arc<AuditLogger>) -> Self {
        Self { policy, audit }
    }

    /// The audit log this gate writes to.
    pub fn audit_log(&self) -> &AuditLogger {
        &self.audit
    }

    /// Check one request. Policy is read now, not at construction, so live
    /// policy updates take effect immediately.
    pub fn check_permission(&self, request: &PermissionRequest) -> PermissionResult {
        let policy = self.policy.current();
        let assessment = RiskAssessor::assess(&request.operation);

        let (allowed, reason) = if matches_any(&request.operation, &policy.blocklist) {
            (false, "Operation matches blocklist".to_string())
        } else if matches_any(&request.operation, &policy.allowlist) {
            (true, "Operation matches allowlist".to_string())
        } else if policy.auto_accept && assessment.level <= policy.accept_risk_level {
            (
                true,
                format!("Auto-accepted ({} risk)", assessment.level),
            )
        } else {
            (
                false,
                format!("{} risk operation requires approval", assessment.level),
            )
        };

        debug!(
            operation = %request.operation,
            kind = %request.kind,
            allowed,
            risk = %assessment.level,
            "Permission check"
        );

        self.audit.record(AuditLogEntry {
            timestamp: Utc::now(),
            kind: request.kind,
            operation: request.operation.clone(),
            allowed,
            risk_level: assessment.level,
            reason: reason.clone(),
            duration_ms: None,
            exit_code: None,
            error: None,
        });

        PermissionResult {
            allowed,
            reason,
            risk_level: assessment.level,
            assessment,
        }
    }
}

/// Substring match against list entries; `*` matches everything.
fn matches_any(operation: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|p| p == "*" || (!p.is_empty() && operation.contains(p.as_str())))
}

/// A policy source that supports live replacement.
pub struct InMemoryPolicySource {
    policy: RwLock<PermissionPolicy>,
}

impl InMemoryPolicySource {
    pub fn new(policy: PermissionPolicy) -> Self {
        Self {
            policy: RwLock::new(policy),
        }
    }

    /// Replace the policy. Takes effect on the next `check_permission`.
    pub fn replace(&self, policy: PermissionPolicy) {
        if let Ok(mut current) = self.policy.write() {
            *current = policy;
        }
    }
}

impl PolicySource for InMemoryPolicySource {
    fn current(&self) -> PermissionPolicy {
        self.policy
            .read()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}
