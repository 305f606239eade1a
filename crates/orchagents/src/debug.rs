use async_trait::async_trait;
use orchcore::{Agent, AgentContext, AgentError, Value};

/// Simple debug agent that logs its input and echoes it back
pub struct DebugAgent;

#[async_trait]
impl Agent for DebugAgent {
    fn id(&self) -> &str {
        "debug.log"
    }

    fn description(&self) -> &str {
        "Logs input values for debugging"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["debug".to_string()]
    }

    async fn execute(&self, ctx: AgentContext) -> Result<Value, AgentError> {
        let message = ctx
            .input("message")
            .and_then(Value::as_str)
            .unwrap_or("(no message)")
            .to_string();

        ctx.events.info(format!("DEBUG: {}", message));
        if let Some(fields) = ctx.input.as_object() {
            for (key, value) in fields {
                ctx.events.info(format!("  {}: {}", key, value));
            }
        }
        tracing::debug!("debug.log in step {}: {}", ctx.step_id, message);

        Ok(serde_json::json!({ "message": message, "input": ctx.input }))
    }
}
