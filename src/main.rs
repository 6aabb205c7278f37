use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stepgraph_core::config::AppConfig;
use stepgraph_core::types::State;
use stepgraph_core::{GraphDefinition, StepGraphError};
use stepgraph_engine::{validator, GraphManager, HandlerRegistry, StateManager, WorkflowExecutor};
use stepgraph_gateway::{AppState, GatewayServer};
use stepgraph_store::MemoryStore;

const DEFAULT_CONFIG: &str = "stepgraph.toml";

#[derive(Parser)]
#[command(name = "stepgraph", version, about = "Directed workflow graph execution engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = DEFAULT_CONFIG, env = "STEPGRAPH_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway (default)
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Check a graph definition file and report every problem
    Validate {
        /// Graph definition (JSON)
        graph: PathBuf,
    },
    /// Execute a graph definition locally with the built-in handlers
    Run {
        /// Graph definition (JSON)
        graph: PathBuf,
        /// Initial state as a JSON object
        #[arg(long)]
        state: Option<String>,
    },
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `run` output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stepgraph=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        None => serve(config, None).await?,
        Some(Commands::Serve { bind }) => serve(config, bind).await?,
        Some(Commands::Validate { graph }) => {
            if !validate_file(&graph)? {
                std::process::exit(1);
            }
        }
        Some(Commands::Run { graph, state }) => {
            if !run_file(&config, &graph, state.as_deref()).await? {
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Load `path`, or fall back to defaults when the default file is absent.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }
    if path == Path::new(DEFAULT_CONFIG) {
        info!("No {} found, using defaults", DEFAULT_CONFIG);
        return Ok(AppConfig::default());
    }
    Err(StepGraphError::ConfigNotFound(path.display().to_string()).into())
}

fn shutdown_on_ctrl_c(what: &'static str) -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down {}...", what);
        cancel_clone.cancel();
    });
    cancel
}

async fn serve(mut config: AppConfig, bind: Option<String>) -> anyhow::Result<()> {
    if let Some(bind) = bind {
        config.gateway.bind = bind;
    }

    let registry = HandlerRegistry::with_builtins();
    info!(handlers = ?registry.list(), "Handler registry ready");

    let state = AppState::in_memory(config.gateway, config.engine, registry);
    let server = GatewayServer::new(state);
    server.run(shutdown_on_ctrl_c("gateway")).await
}

fn read_graph(path: &Path) -> anyhow::Result<GraphDefinition> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read graph file {}", path.display()))?;
    Ok(GraphDefinition::from_json(&raw)?)
}

/// Print the verdict for one graph file. Returns whether it is valid.
fn validate_file(path: &Path) -> anyhow::Result<bool> {
    let graph = match read_graph(path) {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("{}: {:#}", path.display(), e);
            return Ok(false);
        }
    };

    let errors = validator::collect_errors(&graph);
    if errors.is_empty() {
        println!(
            "Graph '{}' is valid ({} nodes, {} edges, {} loops)",
            graph.name,
            graph.nodes.len(),
            graph.edges.len(),
            graph.loops.len()
        );
        return Ok(true);
    }

    eprintln!("Graph '{}' has {} problem(s):", graph.name, errors.len());
    for error in &errors {
        eprintln!("  - {}", error);
    }
    Ok(false)
}

fn parse_initial_state(raw: Option<&str>) -> anyhow::Result<State> {
    let Some(raw) = raw else {
        return Ok(State::new());
    };
    match serde_json::from_str(raw).context("--state is not valid JSON")? {
        serde_json::Value::Object(state) => Ok(state),
        other => anyhow::bail!("--state must be a JSON object, got {}", other),
    }
}

/// Execute one graph file and print the outcome. Returns whether it completed.
async fn run_file(config: &AppConfig, path: &Path, state: Option<&str>) -> anyhow::Result<bool> {
    let graph = read_graph(path)?;
    let initial_state = parse_initial_state(state)?;

    let store = Arc::new(MemoryStore::new());
    let graphs = Arc::new(GraphManager::new(store.clone()));
    let states = Arc::new(StateManager::new(store));
    let executor = WorkflowExecutor::new(
        graphs.clone(),
        states,
        Arc::new(HandlerRegistry::with_builtins()),
    )
    .with_config(config.engine.clone())
    .with_cancel_token(shutdown_on_ctrl_c("run"));

    let graph_id = graphs.create_graph(graph)?;
    let outcome = executor.execute(&graph_id, initial_state).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if let Some(error) = &outcome.error {
        warn!(run_id = %outcome.run_id, error = %error, "Run did not complete");
    }
    Ok(outcome.succeeded())
}
