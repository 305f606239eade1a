use crate::RunId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by an agent's own hooks. The engine only ever displays them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Agent initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Definition errors, raised when a workflow is registered or looked up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Step id must not be empty")]
    EmptyStepId,

    #[error("Duplicate step id: {0}")]
    DuplicateStep(String),

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    DanglingDependency { step: String, dependency: String },

    #[error("Cyclic dependency between steps: {}", steps.join(", "))]
    CyclicDependency { steps: Vec<String> },

    #[error("Invalid reference in {location}: {reason}")]
    InvalidReference { location: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid reference expression '{expression}': {reason}")]
pub struct ReferenceParseError {
    pub expression: String,
    pub reason: String,
}

impl ReferenceParseError {
    pub(crate) fn new(expression: &str, reason: impl Into<String>) -> Self {
        Self {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent '{agent_id}' failed to initialize: {source}")]
    InitializationFailed {
        agent_id: String,
        #[source]
        source: AgentError,
    },
}

/// Step-local failure recorded in the execution trace.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StepError {
    #[error("Unresolved reference '{expression}' in step '{step_id}' (run {run_id})")]
    #[serde(rename_all = "camelCase")]
    UnresolvedReference {
        expression: String,
        step_id: String,
        run_id: RunId,
    },

    #[error("Agent '{agent_id}' failed in step '{step_id}' (run {run_id}): {message}")]
    #[serde(rename_all = "camelCase")]
    AgentExecution {
        agent_id: String,
        step_id: String,
        run_id: RunId,
        message: String,
    },

    #[error("No agent '{agent_id}' bound for step '{step_id}' (run {run_id})")]
    #[serde(rename_all = "camelCase")]
    AgentNotFound {
        agent_id: String,
        step_id: String,
        run_id: RunId,
    },

    #[error("Step '{step_id}' cancelled (run {run_id})")]
    #[serde(rename_all = "camelCase")]
    Cancelled { step_id: String, run_id: RunId },
}

impl StepError {
    pub fn step_id(&self) -> &str {
        match self {
            StepError::UnresolvedReference { step_id, .. }
            | StepError::AgentExecution { step_id, .. }
            | StepError::AgentNotFound { step_id, .. }
            | StepError::Cancelled { step_id, .. } => step_id,
        }
    }
}

/// Engine-fatal condition that aborted a run.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RunError {
    #[error("Agent '{agent_id}' bound by step '{step_id}' is not registered")]
    #[serde(rename_all = "camelCase")]
    AgentNotFound { agent_id: String, step_id: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Run exceeded its deadline of {timeout_ms}ms")]
    #[serde(rename_all = "camelCase")]
    TimedOut { timeout_ms: u64 },
}
