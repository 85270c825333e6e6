//! # Overseer Core
//!
//! Domain types, traits, and error definitions for the Overseer agent runtime.
//! This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator boundary is defined as a trait here. Implementations
//! live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod context;
pub mod error;
pub mod executor;
pub mod policy;
pub mod reasoner;
pub mod spawner;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{
    AgentAction, AgentBudget, AgentConfig, AgentObservation, AgentResult, AgentState, AgentStatus,
    AgentStep,
};
pub use context::AgentContext;
pub use error::{
    AgentError, Error, ExecError, LoopError, OrchestratorError, Result, ToolError,
};
pub use executor::{ExecOptions, ExecOutput, Executor};
pub use policy::{
    OperationKind, PermissionPolicy, PermissionRequest, PermissionResult, PolicySource,
    RiskAssessment, RiskLevel,
};
pub use reasoner::{Reasoner, StepDecision};
pub use spawner::AgentSpawner;
pub use tool::{ParamKind, Tool, ToolParameter, ToolResult, ToolSchema};
