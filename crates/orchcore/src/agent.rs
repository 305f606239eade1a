use crate::{events::EventEmitter, AgentError, RunId, StepId, Value, WorkflowId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Core trait that every executable agent implements.
///
/// Lifecycle hooks take `&self`: once registered an agent is shared between
/// the registry and any in-flight steps, so agents that hold resources keep
/// them behind interior mutability.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique identity used to bind steps to this agent (e.g. "task.extract")
    fn id(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Idempotent setup, run once by the registry before the agent is usable.
    async fn initialize(&self) -> Result<(), AgentError> {
        Ok(())
    }

    /// Consume a resolved input object and produce an output object.
    async fn execute(&self, ctx: AgentContext) -> Result<Value, AgentError>;

    /// Idempotent teardown, run by the registry when it is cleared.
    async fn cleanup(&self) -> Result<(), AgentError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Registered but `initialize` has not finished; not yet handed to steps
    Uninitialized,
    Ready,
    Disposed,
}

/// Everything an agent sees of the run that invoked it
#[derive(Clone)]
pub struct AgentContext {
    pub run_id: RunId,
    pub workflow_id: WorkflowId,
    pub step_id: StepId,

    /// Step inputs after reference resolution, always an object
    pub input: Value,

    /// Event emitter for real-time updates
    pub events: EventEmitter,

    /// Cancelled when the run is cancelled or times out
    pub cancellation: CancellationToken,
}

impl AgentContext {
    pub fn new(
        run_id: RunId,
        workflow_id: impl Into<WorkflowId>,
        step_id: impl Into<StepId>,
        input: Value,
        events: EventEmitter,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            run_id,
            workflow_id: workflow_id.into(),
            step_id: step_id.into(),
            input,
            events,
            cancellation,
        }
    }

    /// A context outside of any run, for driving an agent directly.
    pub fn standalone(step_id: impl Into<StepId>, input: Value) -> Self {
        let run_id = RunId::new_v4();
        let step_id = step_id.into();
        Self::new(
            run_id,
            "standalone",
            step_id.clone(),
            input,
            EventEmitter::detached(run_id, step_id),
            CancellationToken::new(),
        )
    }

    /// Get required input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, AgentError> {
        self.input
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| AgentError::MissingInput(name.to_string()))
    }

    pub fn require_str(&self, name: &str) -> Result<&str, AgentError> {
        self.require_input(name)?
            .as_str()
            .ok_or_else(|| AgentError::InvalidInput {
                field: name.to_string(),
                reason: "expected a string".to_string(),
            })
    }

    pub fn require_array(&self, name: &str) -> Result<&Vec<Value>, AgentError> {
        self.require_input(name)?
            .as_array()
            .ok_or_else(|| AgentError::InvalidInput {
                field: name.to_string(),
                reason: "expected an array".to_string(),
            })
    }

    /// Optional input, `None` when absent or null
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.input.get(name).filter(|v| !v.is_null())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
