use orchagents::{CostEstimatorAgent, DebugAgent, ResourceAnalyzerAgent, TaskExtractorAgent};
use orchcore::{Agent, AgentContext, AgentError};
use serde_json::json;

#[tokio::test]
async fn test_extract_tasks_and_region() {
    let ctx = AgentContext::standalone(
        "extract",
        json!({"userRequest": "Host a web app with a Cosmos database in North Europe"}),
    );
    let output = TaskExtractorAgent.execute(ctx).await.unwrap();

    let services: Vec<&str> = output["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["service"].as_str().unwrap())
        .collect();
    assert_eq!(services, vec!["App Service", "Cosmos DB"]);
    assert_eq!(output["region"], "northeurope");
}

#[tokio::test]
async fn test_extract_prefers_constraint_region() {
    let ctx = AgentContext::standalone(
        "extract",
        json!({
            "userRequest": "Deploy storage in East US",
            "constraints": {"region": "uksouth"}
        }),
    );
    let output = TaskExtractorAgent.execute(ctx).await.unwrap();
    assert_eq!(output["region"], "uksouth");
}

#[tokio::test]
async fn test_extract_rejects_empty_request() {
    let ctx = AgentContext::standalone("extract", json!({"userRequest": "   "}));
    let err = TaskExtractorAgent.execute(ctx).await.unwrap_err();
    assert!(matches!(err, AgentError::InvalidInput { .. }));

    let ctx = AgentContext::standalone("extract", json!({}));
    let err = TaskExtractorAgent.execute(ctx).await.unwrap_err();
    assert_eq!(err, AgentError::MissingInput("userRequest".to_string()));
}

#[tokio::test]
async fn test_analyze_adds_required_companions() {
    let ctx = AgentContext::standalone(
        "analyze",
        json!({
            "tasks": [{"id": "task-1", "service": "Function App"}],
            "region": "westeurope"
        }),
    );
    let output = ResourceAnalyzerAgent.execute(ctx).await.unwrap();

    let services: Vec<&str> = output["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["service"].as_str().unwrap())
        .collect();
    assert_eq!(services, vec!["Function App", "App Service Plan", "Storage Account"]);
    assert_eq!(output["resources"][0]["name"], "func-westeurope");
    assert_eq!(output["resources"][0]["taskId"], "task-1");
    assert!(output["resources"][1].get("taskId").is_none());
}

#[tokio::test]
async fn test_analyze_fails_without_mappable_tasks() {
    let ctx = AgentContext::standalone("analyze", json!({"tasks": [], "region": "eastus"}));
    let err = ResourceAnalyzerAgent.execute(ctx).await.unwrap_err();
    assert!(matches!(err, AgentError::ExecutionFailed(_)));
}

#[tokio::test]
async fn test_estimate_applies_region_factor_and_budget() {
    let ctx = AgentContext::standalone(
        "estimate",
        json!({
            "resources": [
                {"name": "st-westeurope", "service": "Storage Account", "sku": "Standard_LRS", "region": "westeurope"},
                {"name": "kv-westeurope", "service": "Key Vault", "sku": "Standard", "region": "westeurope"}
            ],
            "budget": 20
        }),
    );
    let output = CostEstimatorAgent::new().execute(ctx).await.unwrap();

    assert_eq!(output["breakdown"][0]["cost"], json!(23.59));
    assert_eq!(output["breakdown"][1]["cost"], json!(3.24));
    assert!((output["cost"].as_f64().unwrap() - 26.83).abs() < 1e-9);
    assert_eq!(output["withinBudget"], json!(false));
    assert_eq!(output["currency"], "USD");
}

#[tokio::test]
async fn test_estimate_unknown_sku_counts_zero() {
    let ctx = AgentContext::standalone(
        "estimate",
        json!({"resources": [{"name": "x", "service": "Mystery", "sku": "Z9"}]}),
    );
    let output = CostEstimatorAgent::new().execute(ctx).await.unwrap();
    assert_eq!(output["cost"], json!(0.0));
    assert!(output.get("withinBudget").is_none());
}

#[tokio::test]
async fn test_debug_echoes_input() {
    let ctx = AgentContext::standalone("log", json!({"message": "hello"}));
    let output = DebugAgent.execute(ctx).await.unwrap();
    assert_eq!(output["message"], "hello");
    assert_eq!(output["input"], json!({"message": "hello"}));
}
