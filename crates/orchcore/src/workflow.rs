use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

pub type WorkflowId = String;
pub type StepId = String;
pub type AgentId = String;
pub type RunId = Uuid;

/// Complete workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<StepDefinition>,
    /// Result keys mapped to reference expressions
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub settings: WorkflowSettings,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<WorkflowId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: default_version(),
            description: None,
            steps: Vec::new(),
            outputs: BTreeMap::new(),
            settings: WorkflowSettings::default(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_output(mut self, key: impl Into<String>, expression: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), expression.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.settings.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_max_parallel_steps(mut self, max: usize) -> Self {
        self.settings.max_parallel_steps = Some(max);
        self
    }

    pub fn find_step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a definition from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One step of a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub id: StepId,
    pub agent_id: AgentId,
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    /// Parameter names mapped to literals or reference expressions
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
}

impl StepDefinition {
    pub fn new(id: impl Into<StepId>, agent_id: impl Into<AgentId>) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            depends_on: Vec::new(),
            inputs: BTreeMap::new(),
        }
    }

    pub fn depends_on(mut self, step_id: impl Into<StepId>) -> Self {
        self.depends_on.push(step_id.into());
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }
}

/// Per-workflow overrides of the runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
    /// Deadline for the whole run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel_steps: Option<usize>,
}
