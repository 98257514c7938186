//! Command-line host for the warden autonomous agent runtime.
//!
//! Loads configuration, restores the persisted session, and drives one
//! command against it. Tasks run through the same policy-gated tool
//! registry any other host would use; the bundled oracle is a keyword
//! heuristic.
//!
//! Usage:
//!   warden run "list files"
//!   warden --config warden.toml run "read notes/todo.txt" --max-iterations 5
//!   warden status
//!   warden history --limit 5
//!   warden tools
//!   warden reset

mod oracle;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use warden_contracts::{config::WardenConfig, error::WardenResult, outcome::TaskOutcome};
use warden_core::{AgentHost, AgentLoop, LoopConfig};
use warden_policy::SecurityValidator;
use warden_state::StateStore;
use warden_tools::ToolRegistry;

use crate::oracle::HeuristicOracle;

// ── CLI definition ────────────────────────────────────────────────────────────

/// A bounded, policy-gated autonomous agent.
#[derive(Parser)]
#[command(
    name = "warden",
    version,
    about = "Bounded, policy-gated autonomous agent runtime",
    long_about = "Runs tasks through a bounded reason-act-observe loop. Every tool call\n\
                  is checked against a zero-trust security policy before it runs."
)]
struct Cli {
    /// Configuration file (TOML). Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session state file. Overrides `[agent] state_file`.
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute one task to completion, failure, or cancellation.
    Run {
        prompt: String,
        /// Override `[agent] max_iterations` for this task.
        #[arg(long)]
        max_iterations: Option<u32>,
    },
    /// Show the session and current task.
    Status,
    /// Show recent tasks, oldest first.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List registered tools.
    Tools,
    /// Archive the session and start a fresh one.
    Reset,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("warden: {}", e);
            std::process::exit(2);
        }
    };

    // RUST_LOG wins over `[logging] level`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(false)
        .compact()
        .init();

    match run(cli, config).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("warden: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> WardenResult<WardenConfig> {
    match path {
        Some(path) => WardenConfig::from_file(path),
        None => {
            let config = WardenConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Returns the process exit code.
async fn run(cli: Cli, config: WardenConfig) -> WardenResult<i32> {
    let state_file = cli.state.unwrap_or_else(|| config.agent.state_file.clone());
    let (host, registry) = build_host(&config, state_file)?;

    match cli.command {
        Command::Run { prompt, max_iterations } => {
            let host = Arc::new(host);
            let outcome = run_task(&host, &prompt, max_iterations).await;
            print_outcome(&outcome);
            Ok(if outcome.success { 0 } else { 1 })
        }
        Command::Status => {
            print_json(&host.status().await);
            Ok(0)
        }
        Command::History { limit } => {
            let history = host.history(limit).await;
            if history.is_empty() {
                println!("No tasks yet.");
            }
            for task in history {
                println!(
                    "{}  {:<11}  {:>3} iterations  {}",
                    task.task_id, task.status.to_string(), task.iteration_count, task.description
                );
                if let Some(result) = &task.final_result {
                    println!("    {}", result.lines().next().unwrap_or_default());
                }
            }
            Ok(0)
        }
        Command::Tools => {
            for info in registry.infos() {
                let marker = if info.metadata.implemented { "" } else { " (not implemented)" };
                println!("{:<18} {}{}", info.name, info.metadata.description, marker);
            }
            Ok(0)
        }
        Command::Reset => {
            let archived = host.reset_session().await?;
            println!("Session archived to {}", archived.display());
            Ok(0)
        }
    }
}

/// Run one task; Ctrl-C requests a graceful shutdown.
async fn run_task(host: &Arc<AgentHost>, prompt: &str, max_iterations: Option<u32>) -> TaskOutcome {
    let watcher = {
        let host = Arc::clone(host);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, shutting down");
                let report = host.shutdown().await;
                if report.forced {
                    warn!("task did not stop within the grace period");
                }
            }
        })
    };
    let outcome = host.execute_task(prompt, max_iterations).await;
    watcher.abort();
    outcome
}

fn build_host(config: &WardenConfig, state_file: PathBuf) -> WardenResult<(AgentHost, Arc<ToolRegistry>)> {
    let validator = Arc::new(SecurityValidator::new(config.security.clone())?);
    let registry = Arc::new(warden_tools::default_registry(validator)?);

    let agent_loop = AgentLoop::new(
        Arc::new(HeuristicOracle::new()),
        registry.clone(),
        LoopConfig::from_config(config),
    );
    let store = StateStore::new(state_file);
    let working_directory = config.security.effective_working_directory();
    let state = store.load_or_create(
        &config.agent.name,
        &config.agent.version,
        &working_directory.to_string_lossy(),
    );

    let host = AgentHost::new(
        state,
        agent_loop,
        store,
        Duration::from_secs(config.agent.shutdown_grace_secs),
    );
    Ok((host, registry))
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_outcome(outcome: &TaskOutcome) {
    let verdict = if outcome.success { "completed" } else { "failed" };
    println!("Task {} after {} iteration(s)", verdict, outcome.iterations);
    if let Some(id) = &outcome.task_id {
        println!("Task id: {}", id);
    }
    println!();
    println!("{}", outcome.result);
    if !outcome.success && !outcome.error_history.is_empty() {
        println!();
        println!("Errors:");
        for entry in &outcome.error_history {
            println!("  - {}", entry);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("warden: failed to render output: {}", e),
    }
}
