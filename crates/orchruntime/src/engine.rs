use crate::{AgentRegistry, ExecutionPlan, WorkflowExecutor, WorkflowResult};
use orchcore::{EventBus, ExecutionEvent, Value, WorkflowDefinition, WorkflowError, WorkflowId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

/// Main entry point: stores validated workflows and executes them against
/// an agent registry
pub struct WorkflowEngine {
    registry: Arc<AgentRegistry>,
    executor: WorkflowExecutor,
    event_bus: Arc<EventBus>,
    workflows: RwLock<HashMap<WorkflowId, Arc<ExecutionPlan>>>,
}

impl WorkflowEngine {
    /// Create an engine with default settings and an empty registry
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(AgentRegistry::new()), config)
    }

    /// Create an engine over a registry owned by the hosting application
    pub fn with_registry(registry: Arc<AgentRegistry>, config: RuntimeConfig) -> Self {
        let executor = WorkflowExecutor::new(config.max_parallel_steps)
            .with_default_timeout(config.default_timeout);
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        Self {
            registry,
            executor,
            event_bus,
            workflows: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Validate and store a workflow definition.
    ///
    /// On error nothing is stored. Registering an id that already exists
    /// replaces the previous definition.
    pub async fn register_workflow(&self, definition: WorkflowDefinition) -> Result<(), WorkflowError> {
        let id = definition.id.clone();
        let plan = ExecutionPlan::compile(definition).map_err(|e| {
            tracing::warn!("Rejected workflow {}: {}", id, e);
            e
        })?;
        tracing::info!(
            "Registered workflow {} (order: {})",
            id,
            plan.topological_order().join(" -> ")
        );
        self.workflows.write().await.insert(id, Arc::new(plan));
        Ok(())
    }

    pub async fn unregister_workflow(&self, workflow_id: &str) -> Option<WorkflowDefinition> {
        self.workflows
            .write()
            .await
            .remove(workflow_id)
            .map(|plan| plan.definition().clone())
    }

    pub async fn get_workflow(&self, workflow_id: &str) -> Option<WorkflowDefinition> {
        self.workflows
            .read()
            .await
            .get(workflow_id)
            .map(|plan| plan.definition().clone())
    }

    /// Registered workflow ids, sorted
    pub async fn list_workflows(&self) -> Vec<WorkflowId> {
        let mut ids: Vec<_> = self.workflows.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Step ids of the workflow in scheduling order
    pub async fn execution_order(&self, workflow_id: &str) -> Result<Vec<String>, WorkflowError> {
        let plan = self.plan(workflow_id).await?;
        Ok(plan.topological_order().into_iter().map(String::from).collect())
    }

    /// `(step id, agent id)` pairs whose agent is not in the registry
    pub async fn unbound_steps(&self, workflow_id: &str) -> Result<Vec<(String, String)>, WorkflowError> {
        let plan = self.plan(workflow_id).await?;
        let mut unbound = Vec::new();
        for step in &plan.definition().steps {
            if !self.registry.contains(&step.agent_id).await {
                unbound.push((step.id.clone(), step.agent_id.clone()));
            }
        }
        Ok(unbound)
    }

    /// Execute a registered workflow with `context` as its initial context
    pub async fn execute(&self, workflow_id: &str, context: Value) -> Result<WorkflowResult, WorkflowError> {
        self.execute_with_cancellation(workflow_id, context, CancellationToken::new())
            .await
    }

    /// Execute a registered workflow; cancelling `cancellation` aborts the run
    pub async fn execute_with_cancellation(
        &self,
        workflow_id: &str,
        context: Value,
        cancellation: CancellationToken,
    ) -> Result<WorkflowResult, WorkflowError> {
        let plan = self.plan(workflow_id).await?;
        Ok(self
            .executor
            .execute(&plan, &self.registry, &self.event_bus, context, cancellation)
            .await)
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    async fn plan(&self, workflow_id: &str) -> Result<Arc<ExecutionPlan>, WorkflowError> {
        self.workflows
            .read()
            .await
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the engine
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Upper bound on concurrently running steps of one run
    pub max_parallel_steps: usize,
    pub event_buffer_size: usize,
    /// Deadline for runs whose workflow does not set `timeoutMs`
    pub default_timeout: Option<Duration>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_steps: 4,
            event_buffer_size: 1000,
            default_timeout: None,
        }
    }
}
