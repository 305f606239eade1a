use async_trait::async_trait;
use orchcore::{Agent, AgentContext, AgentError, Value};
use serde::Serialize;

/// Monthly list prices in USD: (service, sku, price)
const PRICES: &[(&str, &str, f64)] = &[
    ("Function App", "Y1", 12.50),
    ("App Service Plan", "Y1", 0.0),
    ("App Service", "B1", 54.75),
    ("Kubernetes Service", "Standard_D2s_v3", 140.16),
    ("Virtual Machine", "Standard_B2s", 30.37),
    ("Storage Account", "Standard_LRS", 21.84),
    ("Cosmos DB", "Serverless", 25.00),
    ("PostgreSQL Flexible Server", "B1ms", 12.41),
    ("SQL Database", "S0", 15.03),
    ("Key Vault", "Standard", 3.00),
    ("Application Insights", "PerGB", 11.50),
];

/// Regional price multipliers; regions not listed price at 1.0
const REGION_FACTORS: &[(&str, f64)] = &[
    ("eastus", 1.0),
    ("eastus2", 1.0),
    ("westus", 1.04),
    ("northeurope", 1.05),
    ("westeurope", 1.08),
    ("uksouth", 1.09),
];

#[derive(Debug, Serialize)]
struct LineItem {
    resource: String,
    service: String,
    sku: String,
    cost: f64,
}

/// Prices planned resources from a static monthly price table
pub struct CostEstimatorAgent {
    currency: String,
}

impl CostEstimatorAgent {
    pub fn new() -> Self {
        Self {
            currency: "USD".to_string(),
        }
    }

    fn unit_price(service: &str, sku: &str) -> Option<f64> {
        PRICES
            .iter()
            .find(|(s, k, _)| *s == service && *k == sku)
            .map(|(_, _, price)| *price)
    }

    fn region_factor(region: &str) -> f64 {
        REGION_FACTORS
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, factor)| *factor)
            .unwrap_or(1.0)
    }
}

impl Default for CostEstimatorAgent {
    fn default() -> Self {
        Self::new()
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn field<'a>(resource: &'a Value, name: &str) -> Result<&'a str, AgentError> {
    resource
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::InvalidInput {
            field: "resources".to_string(),
            reason: format!("resource without '{}'", name),
        })
}

#[async_trait]
impl Agent for CostEstimatorAgent {
    fn id(&self) -> &str {
        "cost.estimate"
    }

    fn description(&self) -> &str {
        "Estimates monthly cost of planned resources and checks it against a budget"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["cost-estimation".to_string(), "budget-check".to_string()]
    }

    async fn execute(&self, ctx: AgentContext) -> Result<Value, AgentError> {
        let resources = ctx.require_array("resources")?;

        let mut breakdown = Vec::with_capacity(resources.len());
        for resource in resources {
            let service = field(resource, "service")?;
            let sku = field(resource, "sku")?;
            let region = resource.get("region").and_then(Value::as_str).unwrap_or_default();

            let cost = match Self::unit_price(service, sku) {
                Some(price) => round_cents(price * Self::region_factor(region)),
                None => {
                    ctx.events.warn(format!("No price for {} {}, counted as 0", service, sku));
                    0.0
                }
            };
            breakdown.push(LineItem {
                resource: field(resource, "name")?.to_string(),
                service: service.to_string(),
                sku: sku.to_string(),
                cost,
            });
        }

        let cost: f64 = breakdown.iter().map(|item| item.cost).sum();
        let mut output = serde_json::json!({
            "cost": cost,
            "currency": self.currency,
            "breakdown": breakdown,
        });

        if let Some(budget) = ctx.input("budget") {
            let budget = budget.as_f64().ok_or_else(|| AgentError::InvalidInput {
                field: "budget".to_string(),
                reason: "expected a number".to_string(),
            })?;
            output["budget"] = budget.into();
            output["withinBudget"] = (cost <= budget).into();
            if cost > budget {
                ctx.events.warn(format!("Estimate {:.2} exceeds budget {:.2}", cost, budget));
            }
        }

        ctx.events.info(format!("Estimated {:.2} {} per month", cost, self.currency));
        Ok(output)
    }
}
