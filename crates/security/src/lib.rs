//! # Overseer Security
//!
//! Risk assessment, permission gating, and audit logging.
//!
//! `RiskAssessor` is a pure function from an operation string to a severity
//! classification. `PermissionGate` combines that with allow/block lists and
//! an auto-accept threshold to decide allow/deny/needs-approval, writing one
//! audit entry per decision.

pub mod audit;
pub mod gate;
pub mod risk;

pub use audit::{AuditError, AuditLogEntry, AuditLogger, AuditSink, TracingSink};
pub use gate::{InMemoryPolicySource, PermissionGate};
pub use risk::RiskAssessor;
