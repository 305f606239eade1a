//! Core abstractions for the orchestration engine
//!
//! This crate provides the agent contract, workflow definition types,
//! reference expressions and the error taxonomy that every other crate
//! depends on. It has no scheduling logic of its own.

mod agent;
mod error;
pub mod events;
mod reference;
mod value;
mod workflow;

pub use agent::{Agent, AgentContext, AgentState};
pub use error::{
    AgentError, OrchestratorError, ReferenceParseError, RegistryError, RunError, StepError,
    WorkflowError,
};
pub use events::*;
pub use reference::{Binding, Reference, ReferenceRoot};
pub use value::{lookup, PathSegment, Value};
pub use workflow::{AgentId, RunId, StepDefinition, StepId, WorkflowDefinition, WorkflowId, WorkflowSettings};

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;
