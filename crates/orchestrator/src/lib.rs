//! # Overseer Orchestrator
//!
//! Spawns, runs, monitors, and aggregates results from trees of sub-agents,
//! and keeps their recursion honest: every spawn is checked against the loop
//! detector's sanctioned patterns, cycle detection, and hard safety ceilings
//! before a sub-agent is ever created.

pub mod loop_detector;
pub mod orchestrator;

pub use loop_detector::{AgentCall, LoopDetector, LoopInfo, LoopPattern};
pub use orchestrator::{
    OrchestrationResult, Orchestrator, OrchestratorStats, SubAgentState, SubAgentStatus,
};
