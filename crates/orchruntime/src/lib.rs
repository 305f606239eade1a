//! Workflow execution runtime
//!
//! This crate provides the engine that validates and stores workflow
//! definitions, owns the agent registry, resolves step inputs and drives
//! DAG-ordered, bounded-parallel execution of a run.

mod engine;
mod executor;
mod plan;
mod registry;
mod resolver;
mod state;

pub use engine::{RuntimeConfig, WorkflowEngine};
pub use executor::WorkflowExecutor;
pub use plan::ExecutionPlan;
pub use registry::{AgentDescriptor, AgentRegistry};
pub use resolver::ReferenceResolver;
pub use state::{ExecutionState, StepResult, StepStatus, StepTrace, WorkflowResult, WorkflowStatus};
