use async_trait::async_trait;
use orchcore::{Agent, AgentContext, AgentError, Value};
use tokio::time::{sleep, Duration};

const DEFAULT_DELAY_MS: u64 = 1000;

/// Delay for `delayMs`, then pass the input through
pub struct DelayAgent;

#[async_trait]
impl Agent for DelayAgent {
    fn id(&self) -> &str {
        "time.delay"
    }

    fn description(&self) -> &str {
        "Delay execution for the given milliseconds"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["time".to_string()]
    }

    async fn execute(&self, ctx: AgentContext) -> Result<Value, AgentError> {
        let delay_ms = ctx
            .input("delayMs")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_DELAY_MS);

        ctx.events.info(format!("Delaying for {}ms", delay_ms));

        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms)) => Ok(ctx.input.clone()),
            _ = ctx.cancellation.cancelled() => Err(AgentError::Cancelled),
        }
    }
}
