//! Sub-agent lifecycle management.
//!
//! The orchestrator owns the sub-agent table, runs agents sequentially, in
//! bounded-parallel batches, or in the background, and aggregates their
//! results. Every spawn passes through the loop detector first; a denied
//! spawn never creates an agent.

use crate::loop_detector::LoopDetector;
use overseer_agent::{Agent, AgentHandle};
use overseer_core::agent::{AgentConfig, AgentResult};
use overseer_core::context::AgentContext;
use overseer_core::error::OrchestratorError;
use overseer_core::reasoner::Reasoner;
use overseer_core::spawner::AgentSpawner;
use overseer_tools::ToolRegistry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock, Semaphore};
use tracing::{debug, info, warn};

/// Lifecycle of one managed sub-agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAgentStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl SubAgentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubAgentStatus::Completed | SubAgentStatus::Failed)
    }
}

/// Monitoring snapshot of one sub-agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentState {
    pub agent_id: String,
    pub task: String,
    pub role: String,
    pub status: SubAgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AgentResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated outcome of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    /// True only when every task spawned and completed successfully
    pub success: bool,
    pub agents: Vec<SubAgentState>,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub total_duration_ms: u64,
    /// One message per denied spawn or failed agent
    pub errors: Vec<String>,
}

/// Counts over the sub-agent table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub total_spawned: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
}

struct SubAgentEntry {
    state: SubAgentState,
    /// Present while the agent has a run left in it; taken for the duration
    /// of a run and restored only on pause.
    agent: Option<Agent>,
    handle: AgentHandle,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

struct Inner {
    reasoner: Arc<dyn Reasoner>,
    tools: Arc<ToolRegistry>,
    detector: Arc<LoopDetector>,
    base_context: AgentContext,
    /// Shared workflow state fed to pattern break conditions at spawn time
    workflow_context: RwLock<serde_json::Value>,
    agents: RwLock<HashMap<String, SubAgentEntry>>,
}

/// Spawns, runs, monitors, and stops sub-agents.
///
/// Cheap to clone; clones share the sub-agent table and loop detector.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
    max_parallel: usize,
}

impl Orchestrator {
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        tools: Arc<ToolRegistry>,
        detector: Arc<LoopDetector>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                reasoner,
                tools,
                detector,
                base_context: AgentContext::root("orchestration"),
                workflow_context: RwLock::new(serde_json::json!({})),
                agents: RwLock::new(HashMap::new()),
            }),
            max_parallel: 4,
        }
    }

    /// Bounded concurrency for `execute_parallel`. Clamped to at least 1.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn detector(&self) -> &Arc<LoopDetector> {
        &self.inner.detector
    }

    /// Replace the workflow state that registered loop patterns evaluate
    /// their break conditions against on the next spawn.
    pub async fn set_workflow_context(&self, value: serde_json::Value) {
        *self.inner.workflow_context.write().await = value;
    }

    /// Create a sub-agent in the `pending` state.
    ///
    /// The spawn is checked against the safety limits and the loop detector
    /// first; on denial no agent is created and no state changes. On success
    /// the agent gets a fresh isolated context (a child of `parent` when
    /// given, of the orchestrator's root otherwise) and its call is pushed
    /// onto the detector stack, where it stays until the agent reaches a
    /// terminal state.
    pub async fn spawn(
        &self,
        task: &str,
        config: AgentConfig,
        parent: Option<&AgentContext>,
    ) -> Result<String, OrchestratorError> {
        self.inner
            .detector
            .check_safety_limits()
            .map_err(|e| OrchestratorError::LoopLimitExceeded(e.to_string()))?;

        let workflow_context = self.inner.workflow_context.read().await.clone();
        if let Some(info) = self
            .inner
            .detector
            .detect_loop(&config.role, &workflow_context)
        {
            if let Err(e) = self.inner.detector.ensure_allowed(&info) {
                warn!(role = %config.role, error = %e, "Spawn denied");
                return Err(OrchestratorError::LoopLimitExceeded(e.to_string()));
            }
            debug!(
                role = %config.role,
                iteration = info.current_iteration,
                "Spawn matches a sanctioned loop pattern"
            );
        }

        let context = parent.unwrap_or(&self.inner.base_context).child(task);
        let agent_id = context.agent_id.clone();
        let role = config.role.clone();

        self.inner.detector.push_call(
            agent_id.clone(),
            role.clone(),
            context.depth,
            context.parent_id.clone(),
        );

        let agent = Agent::new(
            config,
            context,
            self.inner.reasoner.clone(),
            self.inner.tools.clone(),
        );
        let handle = agent.handle();
        let (done_tx, done_rx) = watch::channel(false);

        let entry = SubAgentEntry {
            state: SubAgentState {
                agent_id: agent_id.clone(),
                task: task.to_string(),
                role: role.clone(),
                status: SubAgentStatus::Pending,
                started_at: None,
                ended_at: None,
                result: None,
                error: None,
            },
            agent: Some(agent),
            handle,
            done_tx,
            done_rx,
        };

        self.inner
            .agents
            .write()
            .await
            .insert(agent_id.clone(), entry);

        info!(agent_id = %agent_id, role = %role, task = %task, "Sub-agent spawned");
        Ok(agent_id)
    }

    /// Run one spawned agent to completion (or pause) on the current task.
    pub async fn run_agent(&self, agent_id: &str) -> Result<AgentResult, OrchestratorError> {
        let mut agent = {
            let mut agents = self.inner.agents.write().await;
            let entry = agents
                .get_mut(agent_id)
                .ok_or_else(|| OrchestratorError::UnknownAgent(agent_id.to_string()))?;
            let agent = entry.agent.take().ok_or_else(|| OrchestratorError::AgentFailed {
                agent_id: agent_id.to_string(),
                reason: "agent is already running or finished".into(),
            })?;
            entry.state.status = SubAgentStatus::Running;
            entry.state.started_at = Some(Utc::now());
            agent
        };

        let result = agent.run().await;
        self.record_outcome(agent_id, agent, &result).await;
        Ok(result)
    }

    /// Spawn and run each task in order. A denied spawn or a failed agent is
    /// recorded and does not stop later tasks.
    pub async fn execute_sequential(
        &self,
        tasks: Vec<(String, AgentConfig)>,
    ) -> OrchestrationResult {
        let mut agent_ids = Vec::new();
        let mut errors = Vec::new();

        for (task, config) in tasks {
            let agent_id = match self.spawn(&task, config, None).await {
                Ok(id) => id,
                Err(e) => {
                    errors.push(e.to_string());
                    continue;
                }
            };
            match self.run_agent(&agent_id).await {
                Ok(result) => {
                    if !result.success {
                        errors.push(format!(
                            "agent {agent_id} failed: {}",
                            result.error.as_deref().unwrap_or("unknown error")
                        ));
                    }
                }
                Err(e) => errors.push(e.to_string()),
            }
            agent_ids.push(agent_id);
        }

        self.batch_result(&agent_ids, errors).await
    }

    /// Spawn all tasks, then run them with at most `max_parallel` agents in
    /// flight at once. Completion order is unspecified.
    pub async fn execute_parallel(
        &self,
        tasks: Vec<(String, AgentConfig)>,
    ) -> OrchestrationResult {
        let mut agent_ids = Vec::new();
        let mut errors = Vec::new();

        for (task, config) in tasks {
            match self.spawn(&task, config, None).await {
                Ok(id) => agent_ids.push(id),
                Err(e) => errors.push(e.to_string()),
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let runs = agent_ids.iter().map(|agent_id| {
            let semaphore = semaphore.clone();
            let orchestrator = self.clone();
            let agent_id = agent_id.clone();
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return Err(OrchestratorError::AgentFailed {
                            agent_id,
                            reason: "run slot unavailable".into(),
                        })
                    }
                };
                let result = orchestrator.run_agent(&agent_id).await?;
                Ok::<_, OrchestratorError>((agent_id, result))
            }
        });

        for outcome in futures::future::join_all(runs).await {
            match outcome {
                Ok((agent_id, result)) => {
                    if !result.success {
                        errors.push(format!(
                            "agent {agent_id} failed: {}",
                            result.error.as_deref().unwrap_or("unknown error")
                        ));
                    }
                }
                Err(e) => errors.push(e.to_string()),
            }
        }

        self.batch_result(&agent_ids, errors).await
    }

    /// Start a spawned agent on its own task and return immediately.
    ///
    /// Progress is observable through `check_result` (None while running)
    /// and `get_result` (awaits completion).
    pub async fn execute_background(&self, agent_id: &str) -> Result<(), OrchestratorError> {
        {
            let agents = self.inner.agents.read().await;
            let entry = agents
                .get(agent_id)
                .ok_or_else(|| OrchestratorError::UnknownAgent(agent_id.to_string()))?;
            if entry.agent.is_none() {
                return Err(OrchestratorError::AgentFailed {
                    agent_id: agent_id.to_string(),
                    reason: "agent is already running or finished".into(),
                });
            }
        }

        let orchestrator = self.clone();
        let agent_id = agent_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = orchestrator.run_agent(&agent_id).await {
                warn!(agent_id = %agent_id, error = %e, "Background run failed to start");
            }
        });
        Ok(())
    }

    /// Block until the agent reaches a terminal state.
    pub async fn get_result(&self, agent_id: &str) -> Result<AgentResult, OrchestratorError> {
        let mut done_rx = {
            let agents = self.inner.agents.read().await;
            let entry = agents
                .get(agent_id)
                .ok_or_else(|| OrchestratorError::UnknownAgent(agent_id.to_string()))?;
            if let Some(result) = &entry.state.result {
                return Ok(result.clone());
            }
            entry.done_rx.clone()
        };

        while !*done_rx.borrow() {
            done_rx
                .changed()
                .await
                .map_err(|_| OrchestratorError::AgentFailed {
                    agent_id: agent_id.to_string(),
                    reason: "agent was removed before completing".into(),
                })?;
        }

        let agents = self.inner.agents.read().await;
        let entry = agents
            .get(agent_id)
            .ok_or_else(|| OrchestratorError::UnknownAgent(agent_id.to_string()))?;
        entry
            .state
            .result
            .clone()
            .ok_or_else(|| OrchestratorError::AgentFailed {
                agent_id: agent_id.to_string(),
                reason: "no result recorded".into(),
            })
    }

    /// Non-blocking result check; `None` while the agent is still running.
    pub async fn check_result(
        &self,
        agent_id: &str,
    ) -> Result<Option<AgentResult>, OrchestratorError> {
        let agents = self.inner.agents.read().await;
        let entry = agents
            .get(agent_id)
            .ok_or_else(|| OrchestratorError::UnknownAgent(agent_id.to_string()))?;
        Ok(entry.state.result.clone())
    }

    pub async fn get_status(&self, agent_id: &str) -> Option<SubAgentState> {
        self.inner
            .agents
            .read()
            .await
            .get(agent_id)
            .map(|e| e.state.clone())
    }

    pub async fn list_agents(&self) -> Vec<SubAgentState> {
        self.inner
            .agents
            .read()
            .await
            .values()
            .map(|e| e.state.clone())
            .collect()
    }

    pub async fn get_stats(&self) -> OrchestratorStats {
        let agents = self.inner.agents.read().await;
        let mut stats = OrchestratorStats {
            total_spawned: agents.len(),
            ..Default::default()
        };
        for entry in agents.values() {
            match entry.state.status {
                SubAgentStatus::Pending => stats.pending += 1,
                SubAgentStatus::Running => stats.running += 1,
                SubAgentStatus::Completed => stats.completed += 1,
                SubAgentStatus::Failed => stats.failed += 1,
            }
            if let Some(result) = &entry.state.result {
                stats.total_tokens += result.total_tokens;
                stats.total_cost += result.total_cost;
            }
        }
        stats
    }

    /// Request the agent stop at its next step boundary. Idempotent.
    pub async fn stop(&self, agent_id: &str) -> Result<(), OrchestratorError> {
        let agents = self.inner.agents.read().await;
        let entry = agents
            .get(agent_id)
            .ok_or_else(|| OrchestratorError::UnknownAgent(agent_id.to_string()))?;
        entry.handle.stop();
        Ok(())
    }

    pub async fn stop_all(&self) {
        let agents = self.inner.agents.read().await;
        for entry in agents.values() {
            entry.handle.stop();
        }
    }

    /// Drop terminal entries from the table. Returns how many were removed.
    pub async fn clear_completed(&self) -> usize {
        let mut agents = self.inner.agents.write().await;
        let before = agents.len();
        agents.retain(|_, entry| !entry.state.status.is_terminal());
        before - agents.len()
    }

    async fn record_outcome(&self, agent_id: &str, agent: Agent, result: &AgentResult) {
        let terminal = result.status.is_terminal();
        if terminal {
            self.inner.detector.pop_call(agent_id);
        }

        let mut agents = self.inner.agents.write().await;
        let Some(entry) = agents.get_mut(agent_id) else {
            return;
        };

        if terminal {
            entry.state.status = if result.success {
                SubAgentStatus::Completed
            } else {
                SubAgentStatus::Failed
            };
            entry.state.ended_at = Some(Utc::now());
            entry.state.error = result.error.clone();
            entry.state.result = Some(result.clone());
            let _ = entry.done_tx.send(true);
        } else {
            // Paused: the agent keeps its detector slot and can run again
            entry.state.status = SubAgentStatus::Pending;
            entry.agent = Some(agent);
        }
    }

    async fn batch_result(
        &self,
        agent_ids: &[String],
        errors: Vec<String>,
    ) -> OrchestrationResult {
        let agents = self.inner.agents.read().await;
        let mut states = Vec::with_capacity(agent_ids.len());
        let mut total_tokens = 0u64;
        let mut total_cost = 0f64;
        let mut total_duration_ms = 0u64;
        let mut all_succeeded = true;

        for agent_id in agent_ids {
            let Some(entry) = agents.get(agent_id) else {
                continue;
            };
            if let Some(result) = &entry.state.result {
                total_tokens += result.total_tokens;
                total_cost += result.total_cost;
                total_duration_ms += result.duration_ms;
                all_succeeded &= result.success;
            } else {
                all_succeeded = false;
            }
            states.push(entry.state.clone());
        }

        OrchestrationResult {
            success: errors.is_empty() && all_succeeded,
            agents: states,
            total_tokens,
            total_cost,
            total_duration_ms,
            errors,
        }
    }
}

#[async_trait]
impl AgentSpawner for Orchestrator {
    async fn spawn(&self, task: &str, config: AgentConfig) -> Result<String, OrchestratorError> {
        let agent_id = Orchestrator::spawn(self, task, config, None).await?;
        self.execute_background(&agent_id).await?;
        Ok(agent_id)
    }

    async fn get_result(&self, agent_id: &str) -> Result<AgentResult, OrchestratorError> {
        Orchestrator::get_result(self, agent_id).await
    }

    async fn check_result(
        &self,
        agent_id: &str,
    ) -> Result<Option<AgentResult>, OrchestratorError> {
        Orchestrator::check_result(self, agent_id).await
    }
}
