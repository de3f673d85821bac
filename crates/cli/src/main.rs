//! `flowcore` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate`: validate a workflow JSON file.
//! - `context`:  list the variables a node can reference.
//! - `render`:   preview a template against a node's example context.
//! - `rename`:   rename a node's variable and rewrite downstream templates.
//! - `run`:      execute a workflow (in memory, or durably with Postgres).
//! - `migrate`:  run pending database migrations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use db::models::RunStatus;
use db::repository::runs;
use engine::{
    build_context, builtin_registry, context::example_context, validate_registry, BundleOptions,
    ExecutionResult, ExecutorConfig, Workflow, WorkflowExecutor,
};
use nodes::builtin::InMemoryRecordStore;
use nodes::status::{RecordingPublisher, TracingPublisher};
use nodes::{InMemoryStepStore, StatusPublisher, StatusUpdate};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "flowcore", about = "Workflow execution core for CRM automations", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// Also require an executor for every node type.
        #[arg(long)]
        strict: bool,
    },
    /// Print the variable namespaces visible to a node.
    Context {
        path: PathBuf,
        node_id: String,
        /// Bundle options JSON (inputs and parent workflow contexts).
        #[arg(long)]
        bundle: Option<PathBuf>,
    },
    /// Resolve a template against a node's example context.
    Render {
        path: PathBuf,
        node_id: String,
        template: String,
    },
    /// Give a node a new variable name and print the rewritten workflow.
    Rename {
        path: PathBuf,
        node_id: String,
        new_name: String,
        /// Overwrite the workflow file instead of printing it.
        #[arg(long)]
        write: bool,
    },
    /// Execute a workflow.
    Run {
        path: PathBuf,
        /// Trigger payload JSON file; defaults to `null`.
        #[arg(long)]
        trigger: Option<PathBuf>,
        /// Persist step results in Postgres so the run can be resumed.
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
        /// Continue an interrupted run instead of starting a new one.
        #[arg(long, requires = "database_url")]
        resume: Option<Uuid>,
        #[arg(long, env = "FLOWCORE_MAX_RETRIES", default_value_t = 3)]
        max_retries: u32,
        #[arg(long, env = "FLOWCORE_RETRY_DELAY_MS", default_value_t = 100)]
        retry_delay_ms: u64,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path, strict } => {
            let workflow = read_workflow(&path)?;
            let order = engine::validate_dag(&workflow)?;
            if strict {
                validate_registry(&workflow, &builtin_registry(Arc::new(InMemoryRecordStore::new())))?;
            }
            println!("Workflow is valid. Execution order: {order:?}");
        }

        Command::Context { path, node_id, bundle } => {
            let workflow = read_workflow(&path)?;
            if workflow.node(&node_id).is_none() {
                bail!("no node '{node_id}' in {}", path.display());
            }
            let bundle: Option<BundleOptions> = bundle.as_deref().map(read_json).transpose()?;
            let namespaces = build_context(&node_id, &workflow.nodes, &workflow.edges, bundle.as_ref());
            println!("{}", serde_json::to_string_pretty(&namespaces)?);
        }

        Command::Render { path, node_id, template } => {
            let workflow = read_workflow(&path)?;
            let namespaces = build_context(&node_id, &workflow.nodes, &workflow.edges, None);
            let rendered = nodes::template::render(&template, &example_context(&namespaces));
            for name in &rendered.unresolved {
                warn!(variable = %name, "not visible to node '{node_id}'");
            }
            println!("{}", rendered.output);
        }

        Command::Rename { path, node_id, new_name, write } => {
            let workflow = read_workflow(&path)?;
            let renamed = workflow.rename_variable(&node_id, &new_name)?;
            let json = serde_json::to_string_pretty(&renamed)?;
            if write {
                std::fs::write(&path, json).with_context(|| format!("cannot write {}", path.display()))?;
                info!(%node_id, %new_name, "workflow updated");
            } else {
                println!("{json}");
            }
        }

        Command::Run { path, trigger, database_url, resume, max_retries, retry_delay_ms } => {
            let workflow = read_workflow(&path)?;
            let trigger: Option<Value> = trigger.as_deref().map(read_json).transpose()?;
            let config = ExecutorConfig {
                max_retries,
                retry_base_delay: Duration::from_millis(retry_delay_ms),
            };
            run(workflow, trigger, database_url, resume, config).await?;
        }

        Command::Migrate { database_url } => {
            let pool = db::create_pool(&database_url, 2).await?;
            db::run_migrations(&pool).await?;
            info!("migrations applied successfully");
        }
    }

    Ok(())
}

async fn run(
    workflow: Workflow,
    trigger: Option<Value>,
    database_url: Option<String>,
    resume: Option<Uuid>,
    config: ExecutorConfig,
) -> Result<()> {
    let recorder = Arc::new(RecordingPublisher::new());
    let publishers: Vec<Arc<dyn StatusPublisher>> = vec![recorder.clone(), Arc::new(TracingPublisher)];
    let publisher = Arc::new(Fanout(publishers));
    let registry = builtin_registry(Arc::new(InMemoryRecordStore::new()));

    let outcome = match database_url {
        None => {
            let executor = WorkflowExecutor::new(registry, Arc::new(InMemoryStepStore::new()), publisher, config);
            executor.run(&workflow, trigger.unwrap_or(Value::Null)).await
        }
        Some(url) => {
            let pool = db::create_pool(&url, 5).await?;
            db::run_migrations(&pool).await?;
            let executor = WorkflowExecutor::new(
                registry,
                Arc::new(db::PgStepStore::new(pool.clone())),
                publisher,
                config,
            );

            let (run_id, outcome) = match resume {
                Some(run_id) => {
                    let row = runs::get_run(&pool, run_id).await?;
                    if row.workflow_id != workflow.id {
                        bail!("run {run_id} belongs to workflow {}, not {}", row.workflow_id, workflow.id);
                    }
                    runs::reopen_run(&pool, run_id).await?;
                    (run_id, executor.resume(run_id, &workflow, trigger.unwrap_or(row.trigger)).await)
                }
                None => {
                    let trigger = trigger.unwrap_or(Value::Null);
                    let run_id = Uuid::new_v4();
                    runs::create_run(&pool, run_id, workflow.id, &trigger).await?;
                    (run_id, executor.start(run_id, &workflow, trigger).await)
                }
            };

            let (status, error) = match &outcome {
                Ok(_) => (RunStatus::Succeeded, None),
                Err(e) => (RunStatus::Failed, Some(e.to_string())),
            };
            runs::finish_run(&pool, run_id, status, error.as_deref()).await?;
            outcome
        }
    };

    print_summary(&workflow, &recorder);
    let ExecutionResult { run_id, context, attempts } = outcome?;
    info!(%run_id, attempts, "run finished");
    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}

/// Last status per node, in document order.
fn print_summary(workflow: &Workflow, recorder: &RecordingPublisher) {
    for node in &workflow.nodes {
        eprintln!("{:<24} {:<20} {}", node.id, node.node_type.as_str(), recorder.last(&node.id));
    }
}

/// Publishes every update to each inner publisher in turn.
struct Fanout(Vec<Arc<dyn StatusPublisher>>);

impl StatusPublisher for Fanout {
    fn publish(&self, update: StatusUpdate) {
        for publisher in &self.0 {
            publisher.publish(update.clone());
        }
    }
}

fn read_workflow(path: &Path) -> Result<Workflow> {
    read_json(path)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}
