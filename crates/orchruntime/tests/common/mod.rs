// Test agents shared by the runtime integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use orchcore::{Agent, AgentContext, AgentError, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

type Handler = dyn Fn(&Value) -> Result<Value, AgentError> + Send + Sync;

/// Agent whose behaviour is a closure over its resolved input
pub struct FnAgent {
    id: String,
    handler: Box<Handler>,
    calls: AtomicUsize,
}

impl FnAgent {
    pub fn new(
        id: &str,
        handler: impl Fn(&Value) -> Result<Value, AgentError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
        })
    }

    /// Always returns `output`
    pub fn returning(id: &str, output: Value) -> Arc<Self> {
        Self::new(id, move |_| Ok(output.clone()))
    }

    /// Returns its input unchanged
    pub fn echo(id: &str) -> Arc<Self> {
        Self::new(id, |input| Ok(input.clone()))
    }

    pub fn failing(id: &str, message: &str) -> Arc<Self> {
        let message = message.to_string();
        Self::new(id, move |_| Err(AgentError::ExecutionFailed(message.clone())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for FnAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: AgentContext) -> Result<Value, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(&ctx.input)
    }
}

/// Sleeps for `delay` unless the run is cancelled first
pub struct SlowAgent {
    id: String,
    delay: Duration,
}

impl SlowAgent {
    pub fn new(id: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            delay,
        })
    }
}

#[async_trait]
impl Agent for SlowAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: AgentContext) -> Result<Value, AgentError> {
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => Ok(ctx.input),
            _ = ctx.cancellation.cancelled() => Err(AgentError::Cancelled),
        }
    }
}

/// Records step ids in the order their executions begin
pub struct RecordingAgent {
    id: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingAgent {
    pub fn new(id: &str, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            log,
        })
    }
}

#[async_trait]
impl Agent for RecordingAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: AgentContext) -> Result<Value, AgentError> {
        self.log.lock().unwrap().push(ctx.step_id.clone());
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(serde_json::json!({ "step": ctx.step_id }))
    }
}

/// Counts lifecycle hook invocations
pub struct LifecycleAgent {
    id: String,
    pub initialized: AtomicUsize,
    pub cleaned_up: AtomicUsize,
    fail_init: bool,
    fail_cleanup: bool,
    /// When set, `initialize` waits for a permit before returning
    gate: Option<Arc<Notify>>,
}

impl LifecycleAgent {
    fn build(id: &str, fail_init: bool, fail_cleanup: bool, gate: Option<Arc<Notify>>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            initialized: AtomicUsize::new(0),
            cleaned_up: AtomicUsize::new(0),
            fail_init,
            fail_cleanup,
            gate,
        })
    }

    pub fn new(id: &str) -> Arc<Self> {
        Self::build(id, false, false, None)
    }

    pub fn failing_init(id: &str) -> Arc<Self> {
        Self::build(id, true, false, None)
    }

    pub fn failing_cleanup(id: &str) -> Arc<Self> {
        Self::build(id, false, true, None)
    }

    /// Initialization blocks until `gate` is notified
    pub fn gated(id: &str, gate: Arc<Notify>) -> Arc<Self> {
        Self::build(id, false, false, Some(gate))
    }

    pub fn cleanups(&self) -> usize {
        self.cleaned_up.load(Ordering::SeqCst)
    }

    pub fn initializations(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for LifecycleAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["lifecycle".to_string()]
    }

    async fn initialize(&self) -> Result<(), AgentError> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_init {
            return Err(AgentError::InitializationFailed("no credentials".to_string()));
        }
        Ok(())
    }

    async fn execute(&self, ctx: AgentContext) -> Result<Value, AgentError> {
        Ok(ctx.input)
    }

    async fn cleanup(&self) -> Result<(), AgentError> {
        self.cleaned_up.fetch_add(1, Ordering::SeqCst);
        if self.fail_cleanup {
            return Err(AgentError::ExecutionFailed("connection already closed".to_string()));
        }
        Ok(())
    }
}
