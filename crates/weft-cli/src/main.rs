//! weft CLI - executor 設定を読み込み、処理を流して統計を出す

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use weft_core::executor::DEFAULT;
use weft_core::impls::TracingSink;
use weft_core::{ExecutorRegistry, FutureOptions, Futures, PerformanceMonitor, RuntimeConfig};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_TASKS: u64 = 100_000;

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Deferred values over named executors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workload through the configured executors
    Run {
        /// Executor configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of tasks to submit
        #[arg(long, default_value = "8", value_parser = clap::value_parser!(u64).range(0..=MAX_TASKS))]
        tasks: u64,
        /// Executor the tasks are submitted to
        #[arg(long, default_value = "default")]
        executor: String,
    },
    /// Print executor statistics for a configuration
    Stats {
        /// Executor configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

/// Sum of squares up to `n`; stands in for real work.
fn checksum(n: u64) -> u64 {
    (0..=n).map(|i| i.wrapping_mul(i)).fold(0, u64::wrapping_add)
}

/// Size of the checksum computed by task `i`.
fn task_size(i: u64) -> u64 {
    i.saturating_mul(1_000)
}

async fn run(config: RuntimeConfig, tasks: u64, executor: String) -> Result<()> {
    let registry = Arc::new(ExecutorRegistry::from_config(&config)?);
    let futures = Futures::new(Arc::clone(&registry));
    let monitor = PerformanceMonitor::new(Arc::new(TracingSink::new()));

    let options = FutureOptions::on(executor.as_str());
    let observations: Vec<_> = (0..tasks)
        .map(|i| {
            let observation = futures.apply(options.clone(), move || Ok(checksum(task_size(i))));
            monitor.monitor("weft-cli", "checksum", format!("task-{i}"), &observation);
            observation
        })
        .collect();

    let total = futures
        .all(observations)
        .map(|values| values.into_iter().fold(0u64, u64::wrapping_add));
    monitor.monitor("weft-cli", "total", executor.as_str(), &total);

    let total = total
        .await
        .map_err(|fault| anyhow::anyhow!("workload failed: {fault}"))?;
    info!(tasks, total, executor = %executor, "workload completed");
    println!("total: {total}");

    print_stats(&registry)?;
    if !registry.shutdown(SHUTDOWN_TIMEOUT) {
        tracing::warn!("executors did not terminate within {SHUTDOWN_TIMEOUT:?}");
    }
    Ok(())
}

fn print_stats(registry: &ExecutorRegistry) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&registry.stats())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            tasks,
            executor,
        } => {
            let config = load_config(config.as_ref())?;
            run(config, tasks, executor).await?;
        }
        Commands::Stats { config } => {
            let config = load_config(config.as_ref())?;
            let registry = ExecutorRegistry::from_config(&config)?;
            registry.get_or_build_unbounded(DEFAULT);
            print_stats(&registry)?;
            registry.shutdown(SHUTDOWN_TIMEOUT);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_sums_squares() {
        assert_eq!(checksum(0), 0);
        assert_eq!(checksum(3), 14);
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::parse_from(["weft", "run", "--tasks", "3", "--executor", "io"]);
        match cli.command {
            Commands::Run {
                config,
                tasks,
                executor,
            } => {
                assert!(config.is_none());
                assert_eq!(tasks, 3);
                assert_eq!(executor, "io");
            }
            Commands::Stats { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn task_count_is_capped() {
        let cap = MAX_TASKS.to_string();
        assert!(Cli::try_parse_from(["weft", "run", "--tasks", cap.as_str()]).is_ok());

        let over = (MAX_TASKS + 1).to_string();
        assert!(Cli::try_parse_from(["weft", "run", "--tasks", over.as_str()]).is_err());
        assert!(Cli::try_parse_from(["weft", "run", "--tasks", "-1"]).is_err());
    }

    #[test]
    fn task_size_saturates() {
        assert_eq!(task_size(3), 3_000);
        assert_eq!(task_size(u64::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn run_rejects_unknown_executor() {
        let err = run(RuntimeConfig::default(), 2, "missing".to_string())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("executor not found: name=missing"));
    }
}
