//! Stake Allocation Optimizer
//!
//! Offline planning tool:
//! - CLI arguments and TOML config file support
//! - Snapshot input as JSON or TOML
//! - Ordered action plan written as JSON
//! - Structured logging with tracing
//!
//! Network fetching and action submission live elsewhere; this binary only
//! turns a snapshot file into a plan.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use allocation_optimizer::{
    simulate, AllocationPlan, AllocationVector, Optimizer, OptimizerConfig, Snapshot, VecSink,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "allocation_optimizer")]
#[command(version, about = "Indexer stake allocation optimizer", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "allocation_optimizer.toml")]
    config: String,

    /// Snapshot file (.json or .toml)
    #[arg(short, long, env = "ALLOCATION_SNAPSHOT")]
    snapshot: Option<String>,

    /// Write the plan here instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Override explicit budget from the snapshot
    #[arg(long)]
    budget: Option<f64>,

    /// Override reward pool rate
    #[arg(long)]
    reward_pool_rate: Option<f64>,

    /// Override dust threshold
    #[arg(long)]
    dust_threshold: Option<f64>,

    /// Override cap on newly opened allocations
    #[arg(long)]
    max_new_allocations: Option<usize>,

    /// Emit Reallocate actions instead of Close + Open pairs
    #[arg(long)]
    atomic: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,

    /// Log file path (logs to both file and stderr)
    #[arg(long)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = "allocation_optimizer.toml")]
        output: String,
    },
    /// Validate config without running
    ValidateConfig,
    /// Compute the allocation plan (default)
    Run,
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct AppConfig {
    #[serde(default)]
    optimizer: OptimizerConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    level: String,
    /// Output format: pretty, json, compact
    #[serde(default)]
    format: LogFormat,
    /// Optional log file path (logs to both file and stderr)
    #[serde(default)]
    log_file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::GenerateConfig { output }) => {
            generate_sample_config(output)?;
            return Ok(());
        }
        Some(Commands::ValidateConfig) => {
            let config = load_config(&cli)?;
            config.optimizer.validate()?;
            println!("Configuration is valid:\n{:#?}", config);
            return Ok(());
        }
        Some(Commands::Run) | None => {}
    }

    let config = load_config(&cli)?;
    setup_logging(&config, &cli)?;

    let snapshot_path = cli
        .snapshot
        .as_deref()
        .ok_or("Snapshot required. Set via --snapshot or ALLOCATION_SNAPSHOT env var.")?;
    let mut snapshot = load_snapshot(snapshot_path)?;
    if let Some(budget) = cli.budget {
        snapshot = snapshot.with_budget(budget);
    }

    // CLI args override config
    let mut optimizer_config = config.optimizer.clone();
    if let Some(rate) = cli.reward_pool_rate {
        optimizer_config.reward_pool_rate = rate;
    }
    if let Some(dust) = cli.dust_threshold {
        optimizer_config.dust_threshold = dust;
    }
    if let Some(max) = cli.max_new_allocations {
        optimizer_config.max_new_allocations = Some(max);
    }
    if cli.atomic {
        optimizer_config.atomic_reallocation = true;
    }

    info!(
        snapshot = snapshot_path,
        targets = snapshot.targets.len(),
        atomic = optimizer_config.atomic_reallocation,
        "Optimizing allocations"
    );

    let optimizer = Optimizer::new(optimizer_config)?;
    let plan = optimizer.optimize(&snapshot)?;
    check_replay(&snapshot, &plan)?;

    let mut sink = VecSink::new();
    plan.submit(&mut sink)?;
    for action in sink.actions() {
        info!(%action, "Planned action");
    }

    write_plan(&plan, cli.output.as_deref())?;
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config_path = &cli.config;
    if Path::new(config_path).exists() {
        let content = std::fs::read_to_string(config_path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    } else {
        // Return default config if file doesn't exist
        Ok(AppConfig::default())
    }
}

fn load_snapshot(path: &str) -> Result<Snapshot, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let snapshot = match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("toml") => Snapshot::from_toml_str(&content)?,
        _ => Snapshot::from_json_str(&content)?,
    };
    Ok(snapshot)
}

/// Replay the plan from the snapshot state; refuse to emit one that overdraws.
fn check_replay(
    snapshot: &Snapshot,
    plan: &AllocationPlan,
) -> Result<(), Box<dyn std::error::Error>> {
    let current = AllocationVector::from_current(&snapshot.targets);
    let trace = simulate(&plan.actions, &current, plan.idle_capital)?;
    if !trace.is_legal(1e-9) {
        return Err(format!(
            "Plan overdraws capital: minimum available {}",
            trace.min_available
        )
        .into());
    }
    if !plan.is_converged() {
        warn!(status = ?plan.status, "Emitting plan from a non-converged solve");
    }
    Ok(())
}

fn write_plan(
    plan: &AllocationPlan,
    output: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(plan)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            eprintln!("Plan written to: {}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Logs go to stderr; stdout carries the plan.
fn setup_logging(config: &AppConfig, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let level = cli.log_level.as_ref().unwrap_or(&config.logging.level);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let format = cli
        .log_format
        .as_deref()
        .unwrap_or(match config.logging.format {
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
        });

    // Get log file path from CLI or config
    let log_file = cli.log_file.as_ref().or(config.logging.log_file.as_ref());

    if let Some(log_path) = log_file {
        let file = std::fs::File::create(log_path)?;
        let file = Mutex::new(file);

        // When logging to file, use JSON format for both (easier to parse)
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .json();
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .json();

        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();

        eprintln!(
            "Logging to file: {} (using JSON format for both stderr and file)",
            log_path
        );
    } else {
        match format {
            "json" => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .json()
                    .init();
            }
            "compact" => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .compact()
                    .init();
            }
            _ => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .init();
            }
        }
    }

    Ok(())
}

fn generate_sample_config(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, sample_config()?)?;
    println!("Sample config written to: {}", path);
    Ok(())
}

/// Default config with the optional optimizer limits commented in place.
fn sample_config() -> Result<String, toml::ser::Error> {
    let sample = AppConfig::default();
    let optimizer = toml::to_string_pretty(&sample.optimizer)?;
    let logging = toml::to_string_pretty(&sample.logging)?;

    Ok(format!(
        r#"# Stake Allocation Optimizer Configuration
# See: cargo run --bin allocation_optimizer -- --help

[optimizer]
{optimizer}
# Optional limits (unset by default):
# max_allocation_per_target = 500000.0
# max_new_allocations = 10
# total_network_signal = 3000000.0
# uncontested_seed = 1.0

[logging]
{logging}"#
    ))
}
