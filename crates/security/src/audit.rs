//! Audit logging for permission decisions.
//!
//! One entry is appended per `check_permission` call, in call order. Sink
//! failures are swallowed: a permission decision must remain correct even
//! when auditing is unavailable.

use chrono::{DateTime, Utc};
use overseer_core::policy::{OperationKind, RiskLevel};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

/// Errors a sink may report. Never propagated past the logger.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit sink write failed: {0}")]
    WriteFailed(String),
}

/// One recorded permission decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: OperationKind,
    /// The literal command or path that was checked
    pub operation: String,
    pub allowed: bool,
    pub risk_level: RiskLevel,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Where audit entries are written. Best-effort by contract.
pub trait AuditSink: Send + Sync {
    fn log(&self, entry: &AuditLogEntry) -> Result<(), AuditError>;
}

/// Append-only audit log with fan-out to sinks.
///
/// The in-memory store keeps entries totally ordered by call order. The core
/// never reads its own audit log back; `entries()` exists for operators and
/// tests.
pub struct AuditLogger {
    entries: Mutex<Vec<AuditLogEntry>>,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.entries.lock().map(|e| e.len()).unwrap_or(0);
        f.debug_struct("AuditLogger")
            .field("entry_count", &count)
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sinks: Vec::new(),
        }
    }

    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sinks,
        }
    }

    /// Append an entry and forward it to every sink.
    ///
    /// Sink failures are warn-logged and discarded so the caller's control
    /// flow is never contingent on logging success.
    pub fn record(&self, entry: AuditLogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }

        for sink in &self.sinks {
            if let Err(e) = sink.log(&entry) {
                warn!(error = %e, operation = %entry.operation, "Audit sink write failed");
            }
        }
    }

    /// All recorded entries, in call order.
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

/// Sink that forwards entries to `tracing`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn log(&self, entry: &AuditLogEntry) -> Result<(), AuditError> {
        tracing::info!(
            kind = %entry.kind,
            operation = %entry.operation,
            allowed = entry.allowed,
            risk = %entry.risk_level,
            reason = %entry.reason,
            "AUDIT"
        );
        Ok(())
    }
}
