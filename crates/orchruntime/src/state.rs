use crate::plan::ExecutionPlan;
use chrono::{DateTime, Utc};
use orchcore::{RunError, RunId, StepError, StepId, Value, WorkflowId};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepResult {
    fn pending() -> Self {
        Self {
            status: StepStatus::Pending,
            output: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Per-run record of every step's status and result.
///
/// Only the scheduler mutates it; the resolver reads it between steps.
#[derive(Debug)]
pub struct ExecutionState {
    run_id: RunId,
    context: Value,
    steps: Vec<(StepId, String, StepResult)>,
    index: HashMap<StepId, usize>,
}

impl ExecutionState {
    pub(crate) fn new(run_id: RunId, context: Value, plan: &ExecutionPlan) -> Self {
        let steps: Vec<_> = plan
            .steps()
            .iter()
            .map(|s| (s.id.clone(), s.agent_id.clone(), StepResult::pending()))
            .collect();
        let index = steps
            .iter()
            .enumerate()
            .map(|(i, (id, _, _))| (id.clone(), i))
            .collect();
        Self {
            run_id,
            context,
            steps,
            index,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    pub fn result(&self, step_id: &str) -> Option<&StepResult> {
        self.index.get(step_id).map(|&i| &self.steps[i].2)
    }

    pub fn status(&self, step_id: &str) -> Option<StepStatus> {
        self.result(step_id).map(|r| r.status)
    }

    pub(crate) fn status_at(&self, index: usize) -> StepStatus {
        self.steps[index].2.status
    }

    pub(crate) fn indices_with(&self, status: StepStatus) -> Vec<usize> {
        (0..self.steps.len())
            .filter(|&i| self.steps[i].2.status == status)
            .collect()
    }

    pub fn any_failed(&self) -> bool {
        self.steps.iter().any(|(_, _, r)| r.status == StepStatus::Failed)
    }

    pub(crate) fn mark_running(&mut self, index: usize) {
        if self.transition(index, StepStatus::Running) {
            self.steps[index].2.started_at = Some(Utc::now());
        }
    }

    pub(crate) fn complete(&mut self, index: usize, output: Value, finished_at: DateTime<Utc>) {
        if self.transition(index, StepStatus::Completed) {
            let result = &mut self.steps[index].2;
            result.output = Some(output);
            result.finished_at = Some(finished_at);
        }
    }

    pub(crate) fn fail(&mut self, index: usize, error: StepError, finished_at: DateTime<Utc>) {
        if self.transition(index, StepStatus::Failed) {
            let result = &mut self.steps[index].2;
            result.error = Some(error);
            result.finished_at = Some(finished_at);
        }
    }

    pub(crate) fn skip(&mut self, index: usize) {
        self.transition(index, StepStatus::Skipped);
    }

    /// Apply a lifecycle transition, refusing anything outside
    /// `pending -> running -> terminal` and `pending -> skipped`.
    fn transition(&mut self, index: usize, to: StepStatus) -> bool {
        let (id, _, result) = &mut self.steps[index];
        let allowed = matches!(
            (result.status, to),
            (StepStatus::Pending, StepStatus::Running)
                | (StepStatus::Pending, StepStatus::Skipped)
                | (StepStatus::Running, StepStatus::Completed)
                | (StepStatus::Running, StepStatus::Failed)
        );
        if allowed {
            result.status = to;
        } else {
            tracing::warn!(
                "Ignoring transition of step {} from {:?} to {:?}",
                id,
                result.status,
                to
            );
        }
        allowed
    }

    pub(crate) fn into_trace(self) -> Vec<StepTrace> {
        self.steps
            .into_iter()
            .map(|(step_id, agent_id, r)| StepTrace {
                step_id,
                agent_id,
                status: r.status,
                started_at: r.started_at,
                finished_at: r.finished_at,
                output: r.output,
                error: r.error,
            })
            .collect()
    }
}

/// Diagnostic record of one step, in definition order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTrace {
    pub step_id: StepId,
    pub agent_id: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Completed,
    Failed,
}

/// Result of a workflow run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub run_id: RunId,
    pub workflow_id: WorkflowId,
    pub status: WorkflowStatus,
    #[serde(rename = "durationMs", serialize_with = "duration_ms")]
    pub duration: Duration,
    pub outputs: serde_json::Map<String, Value>,
    pub trace: Vec<StepTrace>,
    /// Set when the run was aborted rather than finishing its pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

impl WorkflowResult {
    pub fn is_completed(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    pub fn step(&self, step_id: &str) -> Option<&StepTrace> {
        self.trace.iter().find(|t| t.step_id == step_id)
    }
}

fn duration_ms<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
