use async_trait::async_trait;
use orchcore::{Agent, AgentContext, AgentError, Value};
use serde::Serialize;

/// Azure resource shape for a service: (service, resource type, name prefix, default sku)
const CATALOGUE: &[(&str, &str, &str, &str)] = &[
    ("Function App", "Microsoft.Web/sites", "func", "Y1"),
    ("App Service Plan", "Microsoft.Web/serverfarms", "plan", "Y1"),
    ("App Service", "Microsoft.Web/sites", "app", "B1"),
    ("Kubernetes Service", "Microsoft.ContainerService/managedClusters", "aks", "Standard_D2s_v3"),
    ("Virtual Machine", "Microsoft.Compute/virtualMachines", "vm", "Standard_B2s"),
    ("Storage Account", "Microsoft.Storage/storageAccounts", "st", "Standard_LRS"),
    ("Cosmos DB", "Microsoft.DocumentDB/databaseAccounts", "cosmos", "Serverless"),
    ("PostgreSQL Flexible Server", "Microsoft.DBforPostgreSQL/flexibleServers", "psql", "B1ms"),
    ("SQL Database", "Microsoft.Sql/servers/databases", "sqldb", "S0"),
    ("Key Vault", "Microsoft.KeyVault/vaults", "kv", "Standard"),
    ("Application Insights", "Microsoft.Insights/components", "appi", "PerGB"),
];

/// Services a service cannot be deployed without
const REQUIRES: &[(&str, &[&str])] = &[
    ("Function App", &["App Service Plan", "Storage Account"]),
    ("App Service", &["App Service Plan"]),
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Resource {
    name: String,
    service: String,
    #[serde(rename = "type")]
    resource_type: &'static str,
    sku: &'static str,
    region: String,
    /// Task that asked for it, absent for implicit dependencies
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<String>,
}

/// Maps extracted tasks onto concrete Azure resources
pub struct ResourceAnalyzerAgent;

impl ResourceAnalyzerAgent {
    fn resource(service: &str, region: &str, task_id: Option<String>) -> Option<Resource> {
        CATALOGUE
            .iter()
            .find(|(name, ..)| *name == service)
            .map(|&(name, resource_type, prefix, sku)| Resource {
                name: format!("{}-{}", prefix, region),
                service: name.to_string(),
                resource_type,
                sku,
                region: region.to_string(),
                task_id,
            })
    }
}

#[async_trait]
impl Agent for ResourceAnalyzerAgent {
    fn id(&self) -> &str {
        "resource.analyze"
    }

    fn description(&self) -> &str {
        "Maps tasks to Azure resources, adding required companion resources"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["resource-analysis".to_string()]
    }

    async fn execute(&self, ctx: AgentContext) -> Result<Value, AgentError> {
        let tasks = ctx.require_array("tasks")?;
        let region = ctx.require_str("region")?;

        let mut resources: Vec<Resource> = Vec::new();
        for task in tasks {
            let Some(service) = task.get("service").and_then(Value::as_str) else {
                return Err(AgentError::InvalidInput {
                    field: "tasks".to_string(),
                    reason: "task without a service".to_string(),
                });
            };
            let task_id = task.get("id").and_then(Value::as_str).map(String::from);

            match Self::resource(service, region, task_id) {
                Some(resource) if !resources.iter().any(|r| r.service == resource.service) => {
                    resources.push(resource)
                }
                Some(_) => {}
                None => ctx.events.warn(format!("No resource mapping for service {}", service)),
            }
        }

        let requested: Vec<String> = resources.iter().map(|r| r.service.clone()).collect();
        for service in &requested {
            let Some((_, needs)) = REQUIRES.iter().find(|(s, _)| *s == service.as_str()) else {
                continue;
            };
            for need in needs.iter() {
                if resources.iter().any(|r| r.service == *need) {
                    continue;
                }
                if let Some(resource) = Self::resource(need, region, None) {
                    resources.push(resource);
                }
            }
        }

        if resources.is_empty() {
            return Err(AgentError::ExecutionFailed(
                "no task maps to a known resource".to_string(),
            ));
        }

        ctx.events.info(format!("Planned {} resources in {}", resources.len(), region));
        Ok(serde_json::json!({ "resources": resources, "region": region }))
    }
}
