//! The agent step loop.
//!
//! One step = ask the reasoner for a decision, record the thought, perform
//! the action (tool calls go through the registry and its permission gate),
//! record the observation. Budgets are checked *before* each step starts;
//! stop and pause are observed at step boundaries only, so recorded steps
//! are never corrupted by cancellation.

use overseer_core::agent::{
    AgentAction, AgentConfig, AgentObservation, AgentResult, AgentState, AgentStatus, AgentStep,
};
use overseer_core::context::AgentContext;
use overseer_core::error::AgentError;
use overseer_core::executor::Executor;
use overseer_core::reasoner::Reasoner;
use overseer_tools::ToolRegistry;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Control handle for an agent that is (or will be) running.
///
/// Cheap to clone; all methods are safe to call concurrently with an
/// in-flight step and are observed at the next step boundary.
#[derive(Clone)]
pub struct AgentHandle {
    stop: Arc<AtomicBool>,
    pause: Arc<AtomicBool>,
}

impl AgentHandle {
    /// Request the agent stop. Idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Request the agent pause at the next step boundary.
    pub fn pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// One agent instance running the reasoning/acting/observing loop.
pub struct Agent {
    config: AgentConfig,
    state: AgentState,
    reasoner: Arc<dyn Reasoner>,
    tools: Arc<ToolRegistry>,
    executor: Option<Arc<dyn Executor>>,
    response: Option<String>,
    handle: AgentHandle,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        context: AgentContext,
        reasoner: Arc<dyn Reasoner>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let state = AgentState::new(context, config.budget.clone());
        Self {
            config,
            state,
            reasoner,
            tools,
            executor: None,
            response: None,
            handle: AgentHandle {
                stop: Arc::new(AtomicBool::new(false)),
                pause: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Attach an executor whose `initialize`/`cleanup` bracket each run.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Rebuild an agent from a pause snapshot and continue from
    /// `current_step`.
    ///
    /// A terminal or inconsistent snapshot is API misuse and errors.
    pub fn resume(
        snapshot: AgentState,
        config: AgentConfig,
        reasoner: Arc<dyn Reasoner>,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self, AgentError> {
        if snapshot.status.is_terminal() {
            return Err(AgentError::InvalidSnapshot(format!(
                "agent {} already reached {:?}",
                snapshot.agent_id, snapshot.status
            )));
        }
        if snapshot.current_step as usize != snapshot.steps.len() {
            return Err(AgentError::InvalidSnapshot(format!(
                "current_step {} does not match {} recorded steps",
                snapshot.current_step,
                snapshot.steps.len()
            )));
        }

        Ok(Self {
            config,
            state: snapshot,
            reasoner,
            tools,
            executor: None,
            response: None,
            handle: AgentHandle {
                stop: Arc::new(AtomicBool::new(false)),
                pause: Arc::new(AtomicBool::new(false)),
            },
        })
    }

    pub fn id(&self) -> &str {
        &self.state.agent_id
    }

    pub fn status(&self) -> AgentStatus {
        self.state.status
    }

    /// Control handle usable from other tasks while this agent runs.
    pub fn handle(&self) -> AgentHandle {
        self.handle.clone()
    }

    /// Serializable snapshot of the full state, for pause/resume and
    /// monitoring.
    pub fn snapshot(&self) -> AgentState {
        self.state.clone()
    }

    /// Replace the configuration. Only valid between runs.
    pub fn update_config(&mut self, config: AgentConfig) -> Result<(), AgentError> {
        if matches!(
            self.state.status,
            AgentStatus::Reasoning | AgentStatus::Acting | AgentStatus::Observing
        ) {
            return Err(AgentError::AlreadyRunning);
        }
        self.state.budget = config.budget.clone();
        self.config = config;
        Ok(())
    }

    /// Stop outside of a run. Idempotent; terminal states are unchanged.
    pub fn stop(&mut self) {
        self.handle.stop();
        if !self.state.status.is_terminal() {
            self.state.status = if self.response.is_some() {
                AgentStatus::Completed
            } else {
                AgentStatus::Interrupted
            };
        }
    }

    /// Run the step loop until a terminal state or a pause.
    ///
    /// A paused run returns a result whose status is non-terminal (`Idle`);
    /// use `snapshot()` + `resume()` to continue it.
    pub async fn run(&mut self) -> AgentResult {
        let run_start = Instant::now();

        info!(
            agent_id = %self.state.agent_id,
            role = %self.config.role,
            task = %self.state.context.task,
            "Agent run starting"
        );

        if let Some(executor) = &self.executor {
            if let Err(e) = executor.initialize().await {
                self.state.status = AgentStatus::Failed;
                return self.result(run_start, Some(format!("executor initialization failed: {e}")));
            }
        }

        let mut error: Option<String> = None;

        loop {
            if self.handle.stop.load(Ordering::SeqCst) {
                if self.response.is_none() {
                    self.state.status = AgentStatus::Interrupted;
                    error = Some("stopped".into());
                }
                break;
            }
            if self.handle.pause.swap(false, Ordering::SeqCst) {
                debug!(agent_id = %self.state.agent_id, "Paused at step boundary");
                self.state.status = AgentStatus::Idle;
                break;
            }

            if let Err(e) = self.check_budget(run_start) {
                warn!(agent_id = %self.state.agent_id, error = %e, "Budget ceiling hit");
                self.state.status = AgentStatus::Failed;
                error = Some(e.to_string());
                break;
            }

            self.state.status = AgentStatus::Reasoning;
            let decision = match self.reasoner.next_step(&self.state).await {
                Ok(decision) => decision,
                Err(e) => {
                    self.state.status = AgentStatus::Failed;
                    error = Some(format!("reasoner failed: {e}"));
                    break;
                }
            };

            let mut step = AgentStep {
                step_number: self.state.current_step + 1,
                timestamp: Utc::now(),
                thought: decision.thought,
                action: decision.action.clone(),
                observation: None,
                tokens_used: decision.tokens_used,
                cost: decision.cost,
            };
            self.state.total_tokens += decision.tokens_used;
            self.state.total_cost += decision.cost;

            match decision.action {
                AgentAction::Think { .. } => {
                    self.push_step(step);
                }
                AgentAction::Finish { response } => {
                    self.push_step(step);
                    self.response = Some(response);
                    self.state.status = AgentStatus::Completed;
                    break;
                }
                AgentAction::Ask { question } => {
                    self.push_step(step);
                    self.response = Some(question);
                    self.state.status = AgentStatus::Completed;
                    break;
                }
                AgentAction::ToolCall { tool, input } => {
                    self.state.status = AgentStatus::Acting;
                    let result = self
                        .tools
                        .execute_scoped(
                            &tool,
                            input,
                            &self.state.context,
                            &self.config.enabled_tools,
                        )
                        .await;
                    self.state.status = AgentStatus::Observing;

                    if !result.success {
                        debug!(agent_id = %self.state.agent_id, tool = %tool, "Tool observation failed (recoverable)");
                    }
                    step.observation = Some(AgentObservation {
                        success: result.success,
                        output: result.output,
                        error: result.error,
                        metadata: result.metadata,
                    });
                    self.push_step(step);
                }
            }
        }

        if let Some(executor) = &self.executor {
            if let Err(e) = executor.cleanup().await {
                warn!(agent_id = %self.state.agent_id, error = %e, "Executor cleanup failed");
            }
        }

        info!(
            agent_id = %self.state.agent_id,
            status = ?self.state.status,
            steps = self.state.steps.len(),
            tokens = self.state.total_tokens,
            "Agent run finished"
        );

        self.result(run_start, error)
    }

    fn push_step(&mut self, step: AgentStep) {
        self.state.steps.push(step);
        self.state.current_step += 1;
    }

    /// Hard ceilings, checked before each step. The duration ceiling spans
    /// the current run; a resumed run starts a fresh clock.
    fn check_budget(&self, run_start: Instant) -> Result<(), AgentError> {
        let budget = &self.state.budget;
        if self.state.current_step >= budget.max_iterations {
            return Err(AgentError::BudgetExceeded(format!(
                "max_iterations ({}) reached",
                budget.max_iterations
            )));
        }
        if self.state.total_tokens >= budget.max_tokens {
            return Err(AgentError::BudgetExceeded(format!(
                "max_tokens ({}) reached",
                budget.max_tokens
            )));
        }
        if self.state.total_cost >= budget.max_cost {
            return Err(AgentError::BudgetExceeded(format!(
                "max_cost (${:.2}) reached",
                budget.max_cost
            )));
        }
        if run_start.elapsed().as_millis() as u64 >= budget.max_duration_ms {
            return Err(AgentError::BudgetExceeded(format!(
                "max_duration ({}ms) reached",
                budget.max_duration_ms
            )));
        }
        if self.estimated_memory() >= budget.max_memory_bytes {
            return Err(AgentError::BudgetExceeded(format!(
                "max_memory ({} bytes) reached",
                budget.max_memory_bytes
            )));
        }
        Ok(())
    }

    /// Rough size of the recorded history.
    fn estimated_memory(&self) -> u64 {
        self.state
            .steps
            .iter()
            .map(|s| {
                s.thought.len()
                    + s.observation
                        .as_ref()
                        .map(|o| o.output.len() + o.error.as_ref().map_or(0, |e| e.len()))
                        .unwrap_or(0)
                    + 128
            })
            .sum::<usize>() as u64
    }

    fn result(&self, run_start: Instant, error: Option<String>) -> AgentResult {
        AgentResult {
            success: self.state.status == AgentStatus::Completed,
            status: self.state.status,
            steps: self.state.steps.clone(),
            response: self.response.clone(),
            error,
            total_tokens: self.state.total_tokens,
            total_cost: self.state.total_cost,
            duration_ms: run_start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use overseer_core::reasoner::StepDecision;
    use overseer_core::tool::{ParamKind, Tool, ToolParameter, ToolResult, ToolSchema};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed script of decisions; repeats the last one forever.
    struct ScriptedReasoner {
        script: Mutex<VecDeque<StepDecision>>,
        repeat_last: Option<StepDecision>,
    }

    impl ScriptedReasoner {
        fn new(script: Vec<StepDecision>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                repeat_last: None,
            }
        }

        fn repeating(decision: StepDecision) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                repeat_last: Some(decision),
            }
        }
    }

    #[async_trait]
    impl Reasoner for ScriptedReasoner {
        async fn next_step(&self, _state: &AgentState) -> Result<StepDecision, AgentError> {
            if let Some(decision) = self.script.lock().unwrap().pop_front() {
                return Ok(decision);
            }
            self.repeat_last
                .clone()
                .ok_or_else(|| AgentError::Reasoner("script exhausted".into()))
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo"
        }
        fn schema(&self) -> ToolSchema {
            ToolSchema::new(vec![ToolParameter::required(
                "text",
                ParamKind::String,
                "text",
            )])
        }
        async fn execute(
            &self,
            args: serde_json::Value,
            _context: &AgentContext,
        ) -> Result<ToolResult, overseer_core::error::ToolError> {
            Ok(ToolResult::ok(args["text"].as_str().unwrap_or_default()))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        Arc::new(registry)
    }

    fn agent(reasoner: ScriptedReasoner) -> Agent {
        Agent::new(
            AgentConfig::new("test", "worker"),
            AgentContext::root("test task"),
            Arc::new(reasoner),
            registry(),
        )
    }

    fn finish(text: &str) -> StepDecision {
        StepDecision::new(
            "wrapping up",
            AgentAction::Finish {
                response: text.into(),
            },
        )
        .with_usage(10, 0.001)
    }

    #[tokio::test]
    async fn finish_action_completes_the_run() {
        let mut agent = agent(ScriptedReasoner::new(vec![finish("done")]));
        let result = agent.run().await;

        assert!(result.success);
        assert_eq!(result.status, AgentStatus::Completed);
        assert_eq!(result.response.as_deref(), Some("done"));
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.total_tokens, 10);
    }

    #[tokio::test]
    async fn tool_call_records_observation() {
        let mut agent = agent(ScriptedReasoner::new(vec![
            StepDecision::new(
                "try the tool",
                AgentAction::ToolCall {
                    tool: "echo".into(),
                    input: serde_json::json!({"text": "observed"}),
                },
            )
            .with_usage(20, 0.002),
            finish("done"),
        ]));
        let result = agent.run().await;

        assert!(result.success);
        assert_eq!(result.steps.len(), 2);
        let observation = result.steps[0].observation.as_ref().unwrap();
        assert!(observation.success);
        assert_eq!(observation.output, "observed");
        assert_eq!(result.total_tokens, 30);
    }

    #[tokio::test]
    async fn failed_tool_observation_is_recoverable() {
        let mut agent = agent(ScriptedReasoner::new(vec![
            StepDecision::new(
                "call something unknown",
                AgentAction::ToolCall {
                    tool: "missing".into(),
                    input: serde_json::json!({}),
                },
            ),
            finish("recovered"),
        ]));
        let result = agent.run().await;

        // The failed observation did not kill the run
        assert!(result.success);
        assert!(!result.steps[0].observation.as_ref().unwrap().success);
        assert_eq!(result.response.as_deref(), Some("recovered"));
    }

    #[tokio::test]
    async fn iteration_budget_is_a_hard_ceiling() {
        let mut agent = agent(ScriptedReasoner::repeating(
            StepDecision::new(
                "thinking in circles",
                AgentAction::Think {
                    thought: "hmm".into(),
                },
            )
            .with_usage(1, 0.0),
        ));
        agent.state.budget.max_iterations = 3;

        let result = agent.run().await;
        assert!(!result.success);
        assert_eq!(result.status, AgentStatus::Failed);
        assert_eq!(result.steps.len(), 3);
        assert!(result.error.unwrap().contains("Budget exceeded"));
    }

    #[tokio::test]
    async fn token_budget_is_a_hard_ceiling() {
        let mut agent = agent(ScriptedReasoner::repeating(
            StepDecision::new(
                "expensive thought",
                AgentAction::Think {
                    thought: "hmm".into(),
                },
            )
            .with_usage(100, 0.0),
        ));
        agent.state.budget.max_tokens = 250;

        let result = agent.run().await;
        assert_eq!(result.status, AgentStatus::Failed);
        // Totals 100, 200, 300 — the check before the fourth step trips
        assert_eq!(result.steps.len(), 3);
        assert!(result.error.unwrap().contains("max_tokens"));
    }

    #[tokio::test]
    async fn duration_budget_checked_before_first_step() {
        let mut agent = agent(ScriptedReasoner::new(vec![finish("never")]));
        agent.state.budget.max_duration_ms = 0;

        let result = agent.run().await;
        assert_eq!(result.status, AgentStatus::Failed);
        assert!(result.steps.is_empty());
        assert!(result.error.unwrap().contains("max_duration"));
    }

    #[tokio::test]
    async fn stop_interrupts_without_corrupting_steps() {
        let mut agent = agent(ScriptedReasoner::new(vec![finish("unreached")]));
        agent.handle().stop();

        let result = agent.run().await;
        assert_eq!(result.status, AgentStatus::Interrupted);
        assert!(!result.success);
        assert!(result.steps.is_empty());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut agent = agent(ScriptedReasoner::new(vec![]));
        agent.stop();
        assert_eq!(agent.status(), AgentStatus::Interrupted);
        agent.stop();
        assert_eq!(agent.status(), AgentStatus::Interrupted);
    }

    #[tokio::test]
    async fn pause_snapshot_resume_continues_from_current_step() {
        let mut agent = agent(ScriptedReasoner::new(vec![
            StepDecision::new(
                "first thought",
                AgentAction::Think {
                    thought: "first".into(),
                },
            )
            .with_usage(5, 0.0),
            finish("after resume"),
        ]));

        // Pause immediately: no steps run yet
        agent.handle().pause();
        let result = agent.run().await;
        assert_eq!(result.status, AgentStatus::Idle);
        assert!(!result.status.is_terminal());

        let snapshot = agent.snapshot();
        assert_eq!(snapshot.current_step, 0);

        // Snapshot survives serialization
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: AgentState = serde_json::from_str(&json).unwrap();

        let mut resumed = Agent::resume(
            restored,
            AgentConfig::new("test", "worker"),
            Arc::new(ScriptedReasoner::new(vec![finish("after resume")])),
            registry(),
        )
        .unwrap();
        let result = resumed.run().await;
        assert!(result.success);
        assert_eq!(result.response.as_deref(), Some("after resume"));
    }

    #[tokio::test]
    async fn resume_rejects_terminal_snapshot() {
        let mut agent = agent(ScriptedReasoner::new(vec![finish("done")]));
        agent.run().await;
        let snapshot = agent.snapshot();

        let err = Agent::resume(
            snapshot,
            AgentConfig::new("test", "worker"),
            Arc::new(ScriptedReasoner::new(vec![])),
            registry(),
        )
        .unwrap_err();
        assert!(matches!(err, AgentError::InvalidSnapshot(_)));
    }

    #[tokio::test]
    async fn resume_rejects_inconsistent_snapshot() {
        let agent = agent(ScriptedReasoner::new(vec![]));
        let mut snapshot = agent.snapshot();
        snapshot.current_step = 7; // no recorded steps

        let err = Agent::resume(
            snapshot,
            AgentConfig::new("test", "worker"),
            Arc::new(ScriptedReasoner::new(vec![])),
            registry(),
        )
        .unwrap_err();
        assert!(matches!(err, AgentError::InvalidSnapshot(_)));
    }

    #[tokio::test]
    async fn ask_action_completes_with_question() {
        let mut agent = agent(ScriptedReasoner::new(vec![StepDecision::new(
            "need input",
            AgentAction::Ask {
                question: "which branch?".into(),
            },
        )]));
        let result = agent.run().await;
        assert!(result.success);
        assert_eq!(result.response.as_deref(), Some("which branch?"));
    }

    #[tokio::test]
    async fn disabled_tool_fails_observation() {
        let mut config = AgentConfig::new("test", "worker");
        config.enabled_tools = vec!["file_read".into()];
        let mut agent = Agent::new(
            config,
            AgentContext::root("test"),
            Arc::new(ScriptedReasoner::new(vec![
                StepDecision::new(
                    "echo is off",
                    AgentAction::ToolCall {
                        tool: "echo".into(),
                        input: serde_json::json!({"text": "hi"}),
                    },
                ),
                finish("done"),
            ])),
            registry(),
        );

        let result = agent.run().await;
        let observation = result.steps[0].observation.as_ref().unwrap();
        assert!(!observation.success);
        assert!(observation.error.as_ref().unwrap().contains("not enabled"));
    }

    #[tokio::test]
    async fn update_config_between_runs() {
        let mut agent = agent(ScriptedReasoner::new(vec![finish("done")]));
        let mut new_config = AgentConfig::new("renamed", "worker");
        new_config.budget.max_iterations = 99;
        agent.update_config(new_config).unwrap();
        assert_eq!(agent.state.budget.max_iterations, 99);
    }
}
