//! Reference agent library
//!
//! Deterministic agents for the infrastructure planning pipeline
//! (`task.extract` → `resource.analyze` → `cost.estimate`) plus a couple of
//! utility agents. They work offline from static tables so workflows can be
//! exercised end to end without external services.

mod analyze;
mod debug;
mod estimate;
mod extract;
mod time;

pub use analyze::ResourceAnalyzerAgent;
pub use debug::DebugAgent;
pub use estimate::CostEstimatorAgent;
pub use extract::TaskExtractorAgent;
pub use time::DelayAgent;

use orchcore::{RegistryError, StepDefinition, WorkflowDefinition};
use orchruntime::AgentRegistry;
use std::sync::Arc;

/// Register all reference agents with a registry
pub async fn register_all(registry: &AgentRegistry) -> Result<(), RegistryError> {
    registry.register(Arc::new(TaskExtractorAgent)).await?;
    registry.register(Arc::new(ResourceAnalyzerAgent)).await?;
    registry.register(Arc::new(CostEstimatorAgent::new())).await?;
    registry.register(Arc::new(DebugAgent)).await?;
    registry.register(Arc::new(DelayAgent)).await?;
    Ok(())
}

/// The three-step infrastructure planning workflow
pub fn infrastructure_workflow() -> WorkflowDefinition {
    WorkflowDefinition::new("infrastructure-planning", "Infrastructure planning")
        .with_version("1.0.0")
        .with_description("Extracts tasks from a request, maps them to Azure resources and prices them")
        .with_step(
            StepDefinition::new("extract", "task.extract")
                .with_input("userRequest", "$context.userRequest")
                .with_input("constraints", "$context.constraints"),
        )
        .with_step(
            StepDefinition::new("analyze", "resource.analyze")
                .depends_on("extract")
                .with_input("tasks", "$steps.extract.output.tasks")
                .with_input("region", "$steps.extract.output.region"),
        )
        .with_step(
            StepDefinition::new("estimate", "cost.estimate")
                .depends_on("analyze")
                .with_input("resources", "$steps.analyze.output.resources")
                .with_input("budget", "$context.constraints.budget"),
        )
        .with_output("tasks", "$steps.extract.output.tasks")
        .with_output("resources", "$steps.analyze.output.resources")
        .with_output("cost", "$steps.estimate.output.cost")
        .with_output("breakdown", "$steps.estimate.output.breakdown")
        .with_output("withinBudget", "$steps.estimate.output.withinBudget")
}
