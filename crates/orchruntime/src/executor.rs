use crate::plan::ExecutionPlan;
use crate::registry::AgentRegistry;
use crate::resolver::ReferenceResolver;
use crate::state::{ExecutionState, StepStatus, WorkflowResult, WorkflowStatus};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use orchcore::{
    AgentContext, AgentError, EventBus, ExecutionEvent, RunError, RunId, StepError, Value,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::task::{AbortHandle, JoinError};
use tokio_util::sync::CancellationToken;

/// What a spawned step reports back to the scheduler
struct StepOutcome {
    result: Result<Value, AgentError>,
    finished_at: DateTime<Utc>,
    duration_ms: u64,
}

type RunningSteps = FuturesUnordered<BoxFuture<'static, (usize, Result<StepOutcome, JoinError>)>>;

enum Wake {
    Finished(usize, Result<StepOutcome, JoinError>),
    Abort(RunError),
}

/// Executes workflow plans as DAGs with bounded parallelism
pub struct WorkflowExecutor {
    max_parallel: usize,
    default_timeout: Option<Duration>,
}

impl WorkflowExecutor {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            default_timeout: None,
        }
    }

    /// Deadline applied to runs whose workflow does not set its own
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Execute one run of `plan` and return its result.
    ///
    /// Step failures, cancellation and dangling agent bindings are all
    /// reported through the returned [`WorkflowResult`].
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        registry: &AgentRegistry,
        event_bus: &EventBus,
        context: Value,
        cancellation: CancellationToken,
    ) -> WorkflowResult {
        let definition = plan.definition();
        let settings = &definition.settings;
        let max_parallel = settings.max_parallel_steps.unwrap_or(self.max_parallel).max(1);
        let timeout = settings
            .timeout_ms
            .map(Duration::from_millis)
            .or(self.default_timeout);

        let run_id = RunId::new_v4();
        let start_time = Instant::now();

        event_bus.emit(ExecutionEvent::WorkflowStarted {
            run_id,
            workflow_id: definition.id.clone(),
            step_count: definition.steps.len(),
            timestamp: Utc::now(),
        });
        tracing::info!("Starting run {} of workflow {}", run_id, definition.id);

        let mut run = Run {
            plan,
            registry,
            event_bus,
            run_id,
            state: ExecutionState::new(run_id, context, plan),
            running: FuturesUnordered::new(),
            aborts: HashMap::new(),
            token: cancellation.child_token(),
            max_parallel,
            abort: None,
        };
        run.drive(timeout).await;
        let result = run.finish(start_time.elapsed());

        event_bus.emit(ExecutionEvent::WorkflowCompleted {
            run_id,
            workflow_id: definition.id.clone(),
            success: result.is_completed(),
            duration_ms: result.duration.as_millis() as u64,
            timestamp: Utc::now(),
        });
        result
    }
}

/// Scheduler state for one run. It is the only writer of `state`.
struct Run<'a> {
    plan: &'a ExecutionPlan,
    registry: &'a AgentRegistry,
    event_bus: &'a EventBus,
    run_id: RunId,
    state: ExecutionState,
    running: RunningSteps,
    aborts: HashMap<usize, AbortHandle>,
    token: CancellationToken,
    max_parallel: usize,
    abort: Option<RunError>,
}

impl<'a> Run<'a> {
    async fn drive(&mut self, timeout: Option<Duration>) {
        let deadline = async move {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            if self.abort.is_none() && self.token.is_cancelled() {
                self.abort = Some(RunError::Cancelled);
            }
            if self.abort.is_none() {
                self.dispatch_ready().await;
            }
            if self.abort.is_some() || self.running.is_empty() {
                break;
            }

            let wake = tokio::select! {
                Some((index, joined)) = self.running.next() => Wake::Finished(index, joined),
                _ = self.token.cancelled() => Wake::Abort(RunError::Cancelled),
                _ = &mut deadline => Wake::Abort(RunError::TimedOut {
                    timeout_ms: timeout.map(|t| t.as_millis() as u64).unwrap_or_default(),
                }),
            };

            match wake {
                Wake::Finished(index, joined) => self.record(index, joined),
                Wake::Abort(error) => {
                    tracing::error!("Run {} aborted: {}", self.run_id, error);
                    self.abort = Some(error);
                }
            }
        }

        if self.abort.is_some() {
            self.abort_remaining();
        }
    }

    /// One pass over the topological order: skip steps whose dependencies
    /// did not complete and start those whose dependencies all did.
    async fn dispatch_ready(&mut self) {
        let plan = self.plan;
        for &index in plan.order() {
            if self.state.status_at(index) != StepStatus::Pending {
                continue;
            }
            let step = &plan.steps()[index];

            let mut waiting = false;
            let mut blocked_by = None;
            for &dependency in &step.dependencies {
                match self.state.status_at(dependency) {
                    StepStatus::Completed => {}
                    StepStatus::Failed | StepStatus::Skipped => {
                        blocked_by = Some(dependency);
                        break;
                    }
                    StepStatus::Pending | StepStatus::Running => waiting = true,
                }
            }

            if let Some(dependency) = blocked_by {
                let reason = format!(
                    "dependency '{}' did not complete",
                    plan.steps()[dependency].id
                );
                self.skip(index, reason);
                continue;
            }
            if waiting || self.running.len() >= self.max_parallel {
                continue;
            }

            self.start(index).await;
            if self.abort.is_some() {
                return;
            }
        }
    }

    async fn start(&mut self, index: usize) {
        let plan = self.plan;
        let step = &plan.steps()[index];
        self.state.mark_running(index);

        let input = match ReferenceResolver::new(&self.state).resolve_inputs(step) {
            Ok(input) => input,
            Err(error) => {
                tracing::warn!("Step {} failed to resolve inputs: {}", step.id, error);
                self.fail(index, error, Utc::now());
                return;
            }
        };

        let agent = match self.registry.get(&step.agent_id).await {
            Ok(agent) => agent,
            Err(_) => {
                tracing::error!("Step {} is bound to unknown agent {}", step.id, step.agent_id);
                let error = StepError::AgentNotFound {
                    agent_id: step.agent_id.clone(),
                    step_id: step.id.clone(),
                    run_id: self.run_id,
                };
                self.fail(index, error, Utc::now());
                self.abort = Some(RunError::AgentNotFound {
                    agent_id: step.agent_id.clone(),
                    step_id: step.id.clone(),
                });
                return;
            }
        };

        self.event_bus.emit(ExecutionEvent::StepStarted {
            run_id: self.run_id,
            step_id: step.id.clone(),
            agent_id: step.agent_id.clone(),
            timestamp: Utc::now(),
        });
        tracing::info!("Starting step {} ({})", step.id, step.agent_id);

        let ctx = AgentContext::new(
            self.run_id,
            plan.definition().id.clone(),
            step.id.clone(),
            input,
            self.event_bus.emitter_for(self.run_id, step.id.clone()),
            self.token.child_token(),
        );

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let result = agent.execute(ctx).await;
            StepOutcome {
                result,
                finished_at: Utc::now(),
                duration_ms: started.elapsed().as_millis() as u64,
            }
        });
        self.aborts.insert(index, handle.abort_handle());
        self.running.push(async move { (index, handle.await) }.boxed());
    }

    fn record(&mut self, index: usize, joined: Result<StepOutcome, JoinError>) {
        self.aborts.remove(&index);
        let plan = self.plan;
        let step = &plan.steps()[index];

        let (result, finished_at, duration_ms) = match joined {
            Ok(outcome) => (outcome.result, outcome.finished_at, outcome.duration_ms),
            Err(e) => (
                Err(AgentError::ExecutionFailed(format!("agent task ended abnormally: {}", e))),
                Utc::now(),
                0,
            ),
        };

        match result {
            Ok(output) => {
                tracing::info!("Step {} completed in {}ms", step.id, duration_ms);
                self.event_bus.emit(ExecutionEvent::StepCompleted {
                    run_id: self.run_id,
                    step_id: step.id.clone(),
                    agent_id: step.agent_id.clone(),
                    output_keys: ExecutionEvent::output_keys(&output),
                    duration_ms,
                    timestamp: Utc::now(),
                });
                self.state.complete(index, output, finished_at);
            }
            Err(_) if self.token.is_cancelled() => {
                let error = StepError::Cancelled {
                    step_id: step.id.clone(),
                    run_id: self.run_id,
                };
                tracing::warn!("Step {} was cancelled", step.id);
                self.fail(index, error, finished_at);
            }
            Err(e) => {
                let error = StepError::AgentExecution {
                    agent_id: step.agent_id.clone(),
                    step_id: step.id.clone(),
                    run_id: self.run_id,
                    message: e.to_string(),
                };
                tracing::warn!("Step {} failed: {}", step.id, e);
                self.fail(index, error, finished_at);
            }
        }
    }

    /// Cancel in-flight steps and skip everything not yet started.
    fn abort_remaining(&mut self) {
        self.token.cancel();
        for (_, handle) in self.aborts.drain() {
            handle.abort();
        }
        self.running = FuturesUnordered::new();

        let now = Utc::now();
        for index in self.state.indices_with(StepStatus::Running) {
            let error = StepError::Cancelled {
                step_id: self.plan.steps()[index].id.clone(),
                run_id: self.run_id,
            };
            self.fail(index, error, now);
        }
        let plan = self.plan;
        for &index in plan.order() {
            if self.state.status_at(index) == StepStatus::Pending {
                self.skip(index, "run aborted".to_string());
            }
        }
    }

    fn fail(&mut self, index: usize, error: StepError, finished_at: DateTime<Utc>) {
        let step = &self.plan.steps()[index];
        self.event_bus.emit(ExecutionEvent::StepFailed {
            run_id: self.run_id,
            step_id: step.id.clone(),
            agent_id: step.agent_id.clone(),
            error: error.clone(),
            timestamp: Utc::now(),
        });
        self.state.fail(index, error, finished_at);
    }

    fn skip(&mut self, index: usize, reason: String) {
        let step_id = self.plan.steps()[index].id.clone();
        tracing::info!("Skipping step {}: {}", step_id, reason);
        self.state.skip(index);
        self.event_bus.emit(ExecutionEvent::StepSkipped {
            run_id: self.run_id,
            step_id,
            reason,
            timestamp: Utc::now(),
        });
    }

    fn finish(self, elapsed: Duration) -> WorkflowResult {
        let failed = self.abort.is_some() || self.state.any_failed();
        let (outputs, missing) =
            ReferenceResolver::new(&self.state).resolve_outputs(self.plan.outputs());

        if !missing.is_empty() {
            if failed {
                tracing::debug!("Omitting unresolved outputs of failed run: {:?}", missing);
            } else {
                tracing::warn!("Outputs did not resolve: {:?}", missing);
            }
        }

        let status = if failed {
            WorkflowStatus::Failed
        } else {
            WorkflowStatus::Completed
        };
        tracing::info!(
            "Run {} finished as {:?} in {}ms",
            self.run_id,
            status,
            elapsed.as_millis()
        );

        WorkflowResult {
            run_id: self.run_id,
            workflow_id: self.plan.definition().id.clone(),
            status,
            duration: elapsed,
            outputs,
            trace: self.state.into_trace(),
            error: self.abort,
        }
    }
}
