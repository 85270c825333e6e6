//! # Overseer Agent
//!
//! The step state machine for a single agent instance: reasoning → acting →
//! observing, once per step, until a finish action, a budget ceiling, an
//! unrecoverable failure, or an external stop.

pub mod runner;

pub use runner::{Agent, AgentHandle};
