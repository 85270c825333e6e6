//! Reasoner trait — the model-call boundary.
//!
//! How natural language turns into an `AgentAction` is not this runtime's
//! concern. The step loop hands the current state to a `Reasoner` and gets
//! back the next decision plus its token/cost delta.

use crate::agent::{AgentAction, AgentState};
use crate::error::AgentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One decision from the reasoner: what to do next and what it cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDecision {
    /// The reasoning behind the action
    pub thought: String,
    pub action: AgentAction,
    /// Tokens consumed producing this decision
    pub tokens_used: u64,
    /// Cost in USD of producing this decision
    pub cost: f64,
}

impl StepDecision {
    pub fn new(thought: impl Into<String>, action: AgentAction) -> Self {
        Self {
            thought: thought.into(),
            action,
            tokens_used: 0,
            cost: 0.0,
        }
    }

    pub fn with_usage(mut self, tokens: u64, cost: f64) -> Self {
        self.tokens_used = tokens;
        self.cost = cost;
        self
    }
}

/// The external collaborator that decides the agent's next step.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn next_step(&self, state: &AgentState) -> Result<StepDecision, AgentError>;
}
