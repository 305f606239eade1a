//! Execution events
//!
//! Every run publishes its lifecycle on the engine's [`EventBus`]; agents
//! add their own notes through the [`EventEmitter`] in their context.
//! Delivery is best effort: a bus without subscribers drops events.

use crate::{AgentId, RunId, StepError, StepId, Value, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ExecutionEvent {
    WorkflowStarted {
        run_id: RunId,
        workflow_id: WorkflowId,
        step_count: usize,
        timestamp: DateTime<Utc>,
    },
    WorkflowCompleted {
        run_id: RunId,
        workflow_id: WorkflowId,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    StepStarted {
        run_id: RunId,
        step_id: StepId,
        agent_id: AgentId,
        timestamp: DateTime<Utc>,
    },
    StepCompleted {
        run_id: RunId,
        step_id: StepId,
        agent_id: AgentId,
        /// Top-level keys of the output object
        output_keys: Vec<String>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    StepFailed {
        run_id: RunId,
        step_id: StepId,
        agent_id: AgentId,
        error: StepError,
        timestamp: DateTime<Utc>,
    },
    StepSkipped {
        run_id: RunId,
        step_id: StepId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    Agent {
        run_id: RunId,
        step_id: StepId,
        event: AgentEvent,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            ExecutionEvent::WorkflowStarted { run_id, .. }
            | ExecutionEvent::WorkflowCompleted { run_id, .. }
            | ExecutionEvent::StepStarted { run_id, .. }
            | ExecutionEvent::StepCompleted { run_id, .. }
            | ExecutionEvent::StepFailed { run_id, .. }
            | ExecutionEvent::StepSkipped { run_id, .. }
            | ExecutionEvent::Agent { run_id, .. } => *run_id,
        }
    }

    /// The step an event is about; `None` for workflow-level events.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            ExecutionEvent::WorkflowStarted { .. } | ExecutionEvent::WorkflowCompleted { .. } => None,
            ExecutionEvent::StepStarted { step_id, .. }
            | ExecutionEvent::StepCompleted { step_id, .. }
            | ExecutionEvent::StepFailed { step_id, .. }
            | ExecutionEvent::StepSkipped { step_id, .. }
            | ExecutionEvent::Agent { step_id, .. } => Some(step_id),
        }
    }

    /// Summarize an output value as its top-level keys.
    pub fn output_keys(output: &Value) -> Vec<String> {
        output
            .as_object()
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Notes an agent reports about its own progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "lowercase")]
pub enum AgentEvent {
    Info { message: String },
    Warning { message: String },
    Progress { percent: f64, message: Option<String> },
}

/// Per-step handle for [`AgentEvent`]s, stamped with the run and step.
#[derive(Clone)]
pub struct EventEmitter {
    run_id: RunId,
    step_id: StepId,
    sender: Option<broadcast::Sender<ExecutionEvent>>,
}

impl EventEmitter {
    /// An emitter nobody listens to, for invoking agents outside a run.
    pub fn detached(run_id: RunId, step_id: impl Into<StepId>) -> Self {
        Self {
            run_id,
            step_id: step_id.into(),
            sender: None,
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(AgentEvent::Info {
            message: message.into(),
        });
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.send(AgentEvent::Warning {
            message: message.into(),
        });
    }

    /// `percent` is clamped to `0..=100`.
    pub fn progress(&self, percent: f64, message: Option<String>) {
        self.send(AgentEvent::Progress {
            percent: percent.clamp(0.0, 100.0),
            message,
        });
    }

    fn send(&self, event: AgentEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        let _ = sender.send(ExecutionEvent::Agent {
            run_id: self.run_id,
            step_id: self.step_id.clone(),
            event,
            timestamp: Utc::now(),
        });
    }
}

/// Broadcast bus shared by all runs of one engine
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("No subscribers, execution event dropped");
        }
    }

    /// An emitter for one step of one run
    pub fn emitter_for(&self, run_id: RunId, step_id: impl Into<StepId>) -> EventEmitter {
        EventEmitter {
            run_id,
            step_id: step_id.into(),
            sender: Some(self.sender.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn emitter_stamps_run_and_step() {
        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let run_id = RunId::new_v4();

        let emitter = bus.emitter_for(run_id, "estimate");
        emitter.progress(140.0, Some("pricing".to_string()));

        let event = events.recv().await.unwrap();
        assert_eq!(event.run_id(), run_id);
        assert_eq!(event.step_id(), Some("estimate"));
        match event {
            ExecutionEvent::Agent { event, .. } => assert_eq!(
                event,
                AgentEvent::Progress {
                    percent: 100.0,
                    message: Some("pricing".to_string())
                }
            ),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn detached_emitter_is_silent() {
        let emitter = EventEmitter::detached(RunId::new_v4(), "extract");
        emitter.info("nobody hears this");
        emitter.warn("or this");
    }

    #[test]
    fn wire_format_uses_camel_case_fields() {
        let event = ExecutionEvent::StepCompleted {
            run_id: RunId::nil(),
            step_id: "analyze".to_string(),
            agent_id: "resource.analyze".to_string(),
            output_keys: ExecutionEvent::output_keys(&json!({"resources": [], "region": "eastus"})),
            duration_ms: 12,
            timestamp: Utc::now(),
        };
        let wire = serde_json::to_value(&event).unwrap();

        assert_eq!(wire["type"], "StepCompleted");
        assert_eq!(wire["agentId"], "resource.analyze");
        assert_eq!(wire["outputKeys"], json!(["region", "resources"]));
        assert_eq!(wire["durationMs"], 12);
        assert_eq!(ExecutionEvent::output_keys(&json!([1, 2])), Vec::<String>::new());
    }
}
