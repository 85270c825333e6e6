//! Agent configuration, budget, and state types.
//!
//! The step loop itself lives in `overseer-agent`; this module defines the
//! data it operates on. `AgentState` is serializable so a paused agent can
//! be snapshotted and resumed later.

use crate::context::AgentContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource ceilings an agent must respect.
///
/// Budgets are hard ceilings, not soft warnings: the step loop checks them
/// before starting a new step and terminates with `Failed` rather than
/// exceeding one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBudget {
    /// Maximum reasoning/acting steps per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Maximum total tokens across all steps
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,

    /// Maximum total cost in USD
    #[serde(default = "default_max_cost")]
    pub max_cost: f64,

    /// Maximum wall-clock duration for the whole run, in milliseconds
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,

    /// Maximum estimated memory for recorded state, in bytes
    #[serde(default = "default_max_memory_bytes")]
    pub max_memory_bytes: u64,

    /// Maximum tool calls in flight at once. Reserved: the step loop
    /// dispatches one tool per step today, so every run observes this at
    /// its default of 1.
    #[serde(default = "default_max_concurrent_tools")]
    pub max_concurrent_tools: u32,
}

fn default_max_iterations() -> u32 {
    25
}
fn default_max_tokens() -> u64 {
    100_000
}
fn default_max_cost() -> f64 {
    5.0
}
fn default_max_duration_ms() -> u64 {
    300_000
}
fn default_max_memory_bytes() -> u64 {
    64 * 1024 * 1024
}
fn default_max_concurrent_tools() -> u32 {
    1
}

impl Default for AgentBudget {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_tokens: default_max_tokens(),
            max_cost: default_max_cost(),
            max_duration_ms: default_max_duration_ms(),
            max_memory_bytes: default_max_memory_bytes(),
            max_concurrent_tools: default_max_concurrent_tools(),
        }
    }
}

/// Configuration for one agent instance.
///
/// Immutable once a run starts; may be replaced between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Human-readable name
    pub name: String,

    /// Role used by loop detection (e.g. "refactoring", "tester").
    /// Advisory metadata — unknown roles are accepted at spawn time.
    pub role: String,

    /// Model identifier forwarded to the reasoner
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// System prompt for the reasoner
    #[serde(default)]
    pub system_prompt: String,

    /// Resource ceilings for each run
    #[serde(default)]
    pub budget: AgentBudget,

    /// Names of tools this agent may call. Empty = all registered tools.
    #[serde(default)]
    pub enabled_tools: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            model: "default".into(),
            temperature: default_temperature(),
            system_prompt: String::new(),
            budget: AgentBudget::default(),
            enabled_tools: Vec::new(),
        }
    }
}

/// Lifecycle states of the agent step loop.
///
/// `Reasoning → Acting → Observing` cycles once per step until a finish
/// action, a budget ceiling, an unrecoverable failure, or an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Reasoning,
    Acting,
    Observing,
    Completed,
    Failed,
    Interrupted,
}

impl AgentStatus {
    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentStatus::Completed | AgentStatus::Failed | AgentStatus::Interrupted
        )
    }
}

/// What the agent decided to do in one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentAction {
    /// Invoke a registered tool
    ToolCall {
        tool: String,
        input: serde_json::Value,
    },
    /// Finish the run with a final response
    Finish { response: String },
    /// Hand control back with a question for the caller
    Ask { question: String },
    /// Record a thought without acting
    Think { thought: String },
}

/// The outcome of executing a `ToolCall` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentObservation {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// One reasoning/acting/observing step. Append-only once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub step_number: u32,
    pub timestamp: DateTime<Utc>,
    pub thought: String,
    pub action: AgentAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<AgentObservation>,
    /// Token delta for this step
    pub tokens_used: u64,
    /// Cost delta for this step, in USD
    pub cost: f64,
}

/// Full runtime state of one agent. Owned exclusively by its `Agent`;
/// read-only snapshots are handed out for pause/resume and monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_id: String,
    pub status: AgentStatus,
    pub current_step: u32,
    pub steps: Vec<AgentStep>,
    pub context: AgentContext,
    pub budget: AgentBudget,
    pub started_at: DateTime<Utc>,
    pub total_tokens: u64,
    pub total_cost: f64,
}

impl AgentState {
    pub fn new(context: AgentContext, budget: AgentBudget) -> Self {
        Self {
            agent_id: context.agent_id.clone(),
            status: AgentStatus::Idle,
            current_step: 0,
            steps: Vec::new(),
            context,
            budget,
            started_at: Utc::now(),
            total_tokens: 0,
            total_cost: 0.0,
        }
    }
}

/// Terminal summary of one agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    pub status: AgentStatus,
    pub steps: Vec<AgentStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub duration_ms: u64,
}
