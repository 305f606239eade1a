use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use orchcore::{AgentEvent, ExecutionEvent, Value, WorkflowDefinition};
use orchruntime::{RuntimeConfig, StepStatus, WorkflowEngine, WorkflowResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orch")]
#[command(about = "Agent workflow orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Initial context as a JSON object
        #[arg(short, long)]
        context: Option<String>,

        /// Abort the run after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Maximum number of steps running at once
        #[arg(long, default_value_t = 4)]
        max_parallel: usize,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file against the built-in agents
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List built-in agents
    Agents,

    /// Write the infrastructure planning workflow as an example
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            context,
            timeout_ms,
            max_parallel,
            verbose,
        } => {
            init_logging(verbose);
            let config = RuntimeConfig {
                max_parallel_steps: max_parallel,
                default_timeout: timeout_ms.map(Duration::from_millis),
                ..RuntimeConfig::default()
            };
            let result = run_workflow(&file, context, config).await?;
            if !result.is_completed() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Validate { file } => {
            init_logging(false);
            if !validate_workflow(&file).await? {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Agents => list_agents().await?,

        Commands::Init { output } => create_example_workflow(&output)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn load_definition(file: &Path) -> Result<WorkflowDefinition> {
    WorkflowDefinition::from_file(file).with_context(|| format!("loading {}", file.display()))
}

async fn engine(config: RuntimeConfig) -> Result<WorkflowEngine> {
    let engine = WorkflowEngine::with_config(config);
    orchagents::register_all(engine.registry()).await?;
    Ok(engine)
}

fn print_event(event: &ExecutionEvent) {
    match event {
        ExecutionEvent::WorkflowStarted {
            workflow_id,
            step_count,
            ..
        } => {
            println!("▶️  Workflow {} started ({} steps)", workflow_id, step_count);
        }
        ExecutionEvent::StepStarted { step_id, agent_id, .. } => {
            println!("  ⚡ Starting step: {} ({})", step_id, agent_id);
        }
        ExecutionEvent::StepCompleted {
            step_id,
            output_keys,
            duration_ms,
            ..
        } => {
            println!(
                "  ✅ Step {} completed in {}ms -> [{}]",
                step_id,
                duration_ms,
                output_keys.join(", ")
            );
        }
        ExecutionEvent::StepFailed { agent_id, error, .. } => {
            println!("  ❌ {} ({})", error, agent_id);
        }
        ExecutionEvent::StepSkipped { step_id, reason, .. } => {
            println!("  ⏭️  Step {} skipped: {}", step_id, reason);
        }
        ExecutionEvent::Agent { step_id, event, .. } => match event {
            AgentEvent::Info { message } => println!("     ℹ️  [{}] {}", step_id, message),
            AgentEvent::Warning { message } => println!("     ⚠️  [{}] {}", step_id, message),
            AgentEvent::Progress { percent, message } => match message {
                Some(msg) => println!("     📊 [{}] {}% - {}", step_id, percent, msg),
                None => println!("     📊 [{}] {}%", step_id, percent),
            },
        },
        ExecutionEvent::WorkflowCompleted { success, duration_ms, .. } => {
            if *success {
                println!("✨ Workflow completed successfully in {}ms", duration_ms);
            } else {
                println!("💥 Workflow failed after {}ms", duration_ms);
            }
        }
    }
}

async fn run_workflow(
    file: &Path,
    context: Option<String>,
    config: RuntimeConfig,
) -> Result<WorkflowResult> {
    println!("🚀 Loading workflow from: {}", file.display());
    let definition = load_definition(file)?;
    let workflow_id = definition.id.clone();
    println!("📋 Workflow: {} ({} steps)", definition.name, definition.steps.len());
    println!();

    let context: Value = match context {
        Some(raw) => serde_json::from_str(&raw).context("parsing --context")?,
        None => Value::Object(Default::default()),
    };
    if !context.is_object() {
        bail!("Context must be a JSON object");
    }

    let engine = engine(config).await?;
    engine.register_workflow(definition).await?;

    let mut events = engine.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(&event);
            if matches!(event, ExecutionEvent::WorkflowCompleted { .. }) {
                break;
            }
        }
    });

    let cancellation = CancellationToken::new();
    let ctrl_c = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            ctrl_c.cancel();
        }
    });

    let result = engine
        .execute_with_cancellation(&workflow_id, context, cancellation)
        .await?;
    let _ = event_task.await;

    println!();
    println!("📊 Execution Summary:");
    println!("   Run ID: {}", result.run_id);
    println!("   Status: {:?}", result.status);
    for step in &result.trace {
        let mark = match step.status {
            StepStatus::Completed => "✅",
            StepStatus::Failed => "❌",
            StepStatus::Skipped => "⏭️ ",
            StepStatus::Pending | StepStatus::Running => "⏳",
        };
        println!("   {} {} ({})", mark, step.step_id, step.agent_id);
        if let Some(error) = &step.error {
            println!("      {}", error);
        }
    }
    if let Some(error) = &result.error {
        println!("   Run error: {}", error);
    }

    println!();
    println!("📤 Result:");
    println!("{}", serde_json::to_string_pretty(&result)?);

    engine.registry().clear().await;
    Ok(result)
}

async fn validate_workflow(file: &Path) -> Result<bool> {
    println!("🔍 Validating workflow: {}", file.display());

    let definition = load_definition(file)?;
    let workflow_id = definition.id.clone();
    let name = definition.name.clone();
    let engine = engine(RuntimeConfig::default()).await?;

    if let Err(e) = engine.register_workflow(definition).await {
        println!("❌ {}", e);
        return Ok(false);
    }

    let unbound = engine.unbound_steps(&workflow_id).await?;
    if !unbound.is_empty() {
        for (step_id, agent_id) in &unbound {
            println!("❌ Step '{}' uses unknown agent '{}'", step_id, agent_id);
        }
        return Ok(false);
    }

    println!("✅ Workflow is valid:");
    println!("   Name: {}", name);
    println!(
        "   Order: {}",
        engine.execution_order(&workflow_id).await?.join(" -> ")
    );
    Ok(true)
}

async fn list_agents() -> Result<()> {
    println!("📦 Available Agents:");
    println!();

    let engine = engine(RuntimeConfig::default()).await?;
    for agent in engine.registry().descriptors().await {
        println!("  • {} [{}]", agent.id, agent.capabilities.join(", "));
        println!("    {}", agent.description);
    }
    engine.registry().clear().await;
    Ok(())
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let json = orchagents::infrastructure_workflow().to_json()?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  orch run --file {} --context '{{\"userRequest\": \"Deploy an Azure Function App with storage in West Europe\", \"constraints\": {{\"region\": \"westeurope\", \"budget\": 500}}}}'",
        output.display()
    );
    Ok(())
}
