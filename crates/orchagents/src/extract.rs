use async_trait::async_trait;
use orchcore::{Agent, AgentContext, AgentError, Value};
use serde::Serialize;

/// A keyword rule mapping request text onto a task
struct Rule {
    keyword: &'static str,
    category: &'static str,
    service: &'static str,
    /// Only applies when no other rule matched the category
    fallback: bool,
}

const fn rule(keyword: &'static str, category: &'static str, service: &'static str) -> Rule {
    Rule {
        keyword,
        category,
        service,
        fallback: false,
    }
}

const fn fallback(keyword: &'static str, category: &'static str, service: &'static str) -> Rule {
    Rule {
        keyword,
        category,
        service,
        fallback: true,
    }
}

const RULES: &[Rule] = &[
    rule("function app", "compute", "Function App"),
    rule("azure function", "compute", "Function App"),
    rule("web app", "compute", "App Service"),
    rule("app service", "compute", "App Service"),
    rule("kubernetes", "compute", "Kubernetes Service"),
    rule("aks", "compute", "Kubernetes Service"),
    rule("virtual machine", "compute", "Virtual Machine"),
    rule("storage", "storage", "Storage Account"),
    rule("blob", "storage", "Storage Account"),
    rule("cosmos", "database", "Cosmos DB"),
    rule("postgres", "database", "PostgreSQL Flexible Server"),
    rule("azure sql", "database", "SQL Database"),
    fallback("database", "database", "SQL Database"),
    rule("payment", "security", "Key Vault"),
    rule("secret", "security", "Key Vault"),
    rule("key vault", "security", "Key Vault"),
    rule("monitor", "monitoring", "Application Insights"),
    rule("insights", "monitoring", "Application Insights"),
];

const REGIONS: &[(&str, &str)] = &[
    ("west europe", "westeurope"),
    ("north europe", "northeurope"),
    ("uk south", "uksouth"),
    ("east us 2", "eastus2"),
    ("east us", "eastus"),
    ("west us", "westus"),
];

const DEFAULT_REGION: &str = "eastus";

#[derive(Debug, Serialize)]
struct Task {
    id: String,
    category: &'static str,
    service: &'static str,
    keyword: &'static str,
}

/// Turns a free-text infrastructure request into a list of tasks
pub struct TaskExtractorAgent;

impl TaskExtractorAgent {
    fn extract(request: &str) -> Vec<Task> {
        let text = request.to_lowercase();
        let mut tasks: Vec<Task> = Vec::new();

        for rule in RULES {
            if !text.contains(rule.keyword) {
                continue;
            }
            let taken = tasks.iter().any(|t| {
                t.service == rule.service || (rule.fallback && t.category == rule.category)
            });
            if !taken {
                tasks.push(Task {
                    id: format!("task-{}", tasks.len() + 1),
                    category: rule.category,
                    service: rule.service,
                    keyword: rule.keyword,
                });
            }
        }
        tasks
    }

    fn region(request: &str, constraints: Option<&Value>) -> String {
        if let Some(region) = constraints
            .and_then(|c| c.get("region"))
            .and_then(Value::as_str)
        {
            return region.to_string();
        }
        let text = request.to_lowercase();
        REGIONS
            .iter()
            .find(|(name, _)| text.contains(name))
            .map(|(_, code)| code.to_string())
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }
}

#[async_trait]
impl Agent for TaskExtractorAgent {
    fn id(&self) -> &str {
        "task.extract"
    }

    fn description(&self) -> &str {
        "Extracts infrastructure tasks and the target region from a request"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["requirements".to_string(), "task-extraction".to_string()]
    }

    async fn execute(&self, ctx: AgentContext) -> Result<Value, AgentError> {
        let request = ctx.require_str("userRequest")?.trim();
        if request.is_empty() {
            return Err(AgentError::InvalidInput {
                field: "userRequest".to_string(),
                reason: "request is empty".to_string(),
            });
        }

        let tasks = Self::extract(request);
        if tasks.is_empty() {
            ctx.events.warn("No known infrastructure keywords in request");
        }
        let region = Self::region(request, ctx.input("constraints"));
        ctx.events.info(format!("Extracted {} tasks for {}", tasks.len(), region));

        Ok(serde_json::json!({
            "tasks": tasks,
            "region": region,
            "request": request,
        }))
    }
}
