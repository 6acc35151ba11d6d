//! Sandpit CLI
//!
//! A command-line front end for running untrusted code in per-execution workspaces.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sandpit::{
    Config, EXAMPLE_CONFIG, ExecuteError, ExecutionRequest, ExecutionResult, ResourceLimits,
    Runner, Sweeper,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sandpit")]
#[command(about = "A tool for running untrusted code in many languages")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: sandpit.toml)
        #[arg(short, long, default_value = "sandpit.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a program (compile if needed, then execute) and print the JSON result
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language ID (e.g., cpp, python)
        #[arg(short, long)]
        language: String,

        /// File fed to the program's standard input
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Wall clock limit for the run step in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Per-stream output cap for the run step in bytes
        #[arg(long)]
        output_cap: Option<u64>,
    },

    /// Execute newline-delimited JSON requests from stdin
    Serve {
        /// Maximum number of executions running at once
        #[arg(short = 'j', long, default_value = "4")]
        max_concurrency: usize,
    },

    /// List available languages
    Languages,

    /// Remove stale workspaces once
    Sweep {
        /// Override the configured staleness threshold
        #[arg(long)]
        max_age_secs: Option<u64>,
    },

    /// Show effective configuration
    ShowConfig,
}

/// One line of `serve` input
#[derive(Deserialize)]
struct ServeRequest {
    /// Echoed back so callers can match responses to requests
    #[serde(default)]
    id: Option<serde_json::Value>,

    #[serde(flatten)]
    request: ExecutionRequest,
}

/// One line of `serve` output
#[derive(Serialize)]
struct ServeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<serde_json::Value>,

    #[serde(flatten)]
    body: ResponseBody,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ResponseBody {
    Executed(ExecutionResult),
    Failed { error: String, rejected: bool },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Init { output, force } = &cli.command {
        return init_config(output, *force).await;
    }

    match cli.config {
        Some(ref path) => info!(?path, "loading configuration"),
        None => debug!("using default configuration"),
    }
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Run {
            source,
            language,
            input,
            timeout_ms,
            output_cap,
        } => {
            run_execute(
                config,
                &source,
                &language,
                input.as_deref(),
                timeout_ms,
                output_cap,
            )
            .await
        }
        Commands::Serve { max_concurrency } => serve(config, max_concurrency).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::Sweep { max_age_secs } => run_sweep(&config, max_age_secs).await,
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn run_execute(
    mut config: Config,
    source: &Path,
    language_id: &str,
    input: Option<&Path>,
    timeout_ms: Option<u64>,
    output_cap: Option<u64>,
) -> Result<()> {
    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;

    let mut request = ExecutionRequest::new(language_id, code);
    if let Some(input_path) = input {
        let stdin = tokio::fs::read_to_string(input_path)
            .await
            .context("failed to read input file")?;
        request = request.with_stdin(stdin);
    }

    // Only explicitly-specified values are applied so they don't
    // override per-language defaults
    if (timeout_ms.is_some() || output_cap.is_some())
        && let Some(language) = config.languages.get_mut(language_id)
    {
        let limits = language.run.limits.get_or_insert_with(ResourceLimits::unset);
        if let Some(ms) = timeout_ms {
            limits.timeout_ms = Some(ms);
        }
        if let Some(bytes) = output_cap {
            limits.output_byte_cap = Some(bytes);
        }
    }

    info!(language = language_id, "running program");

    let runner = Runner::new(config);
    let result = match runner.execute(&request).await {
        Ok(result) => result,
        Err(e) if e.is_rejection() => {
            eprintln!("Request rejected: {e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("execution failed"),
    };

    let json = serde_json::to_string_pretty(&result).context("failed to encode result")?;
    println!("{json}");

    info!(
        execution_time_ms = result.execution_time,
        exit_code = ?result.exit_code,
        error = ?result.error,
        "execution result"
    );

    Ok(())
}

async fn serve(config: Config, max_concurrency: usize) -> Result<()> {
    let started = Instant::now();
    let runner = Runner::new(config.clone());

    let sweeper = if config.sweeper.enabled {
        Some(Sweeper::from_config(&config).start())
    } else {
        debug!("sweeper disabled");
        None
    };

    let permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    info!(max_concurrency, "serving requests from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();
    let mut received = 0u64;

    while let Some(line) = lines.next_line().await.context("failed to read request")? {
        reap_finished(&mut tasks);
        if line.trim().is_empty() {
            continue;
        }
        received += 1;

        let permit = permits
            .clone()
            .acquire_owned()
            .await
            .context("concurrency limiter closed")?;
        let runner = runner.clone();
        let tx = tx.clone();

        tasks.spawn(async move {
            let response = handle_line(&runner, &line).await;
            drop(permit);
            match serde_json::to_string(&response) {
                Ok(encoded) => {
                    let _ = tx.send(encoded);
                }
                Err(e) => warn!(error = %e, "failed to encode response"),
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "request task panicked");
        }
    }

    drop(tx);
    writer
        .await
        .context("output task failed")?
        .context("failed to write response")?;

    if let Some(handle) = sweeper {
        handle.stop().await;
    }

    info!(
        requests = received,
        uptime_secs = started.elapsed().as_secs(),
        "serve finished"
    );
    Ok(())
}

/// Join request tasks that have already completed, returning how many were joined
fn reap_finished(tasks: &mut JoinSet<()>) -> usize {
    let mut reaped = 0;
    while let Some(joined) = tasks.try_join_next() {
        if let Err(e) = joined {
            warn!(error = %e, "request task panicked");
        }
        reaped += 1;
    }
    reaped
}

async fn handle_line(runner: &Runner, line: &str) -> ServeResponse {
    let ServeRequest { id, request } = match serde_json::from_str::<ServeRequest>(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "malformed request");
            return ServeResponse {
                id: None,
                body: ResponseBody::Failed {
                    error: format!("malformed request: {e}"),
                    rejected: true,
                },
            };
        }
    };

    let body = match runner.execute(&request).await {
        Ok(result) => ResponseBody::Executed(result),
        Err(e) => ResponseBody::Failed {
            error: public_error(&e),
            rejected: e.is_rejection(),
        },
    };

    ServeResponse { id, body }
}

/// Message safe to hand back to a caller
///
/// Host-side failures are logged in full but reported generically.
fn public_error(error: &ExecuteError) -> String {
    if error.is_rejection() {
        error.to_string()
    } else {
        warn!(error = %error, "internal execution error");
        "internal error".to_owned()
    }
}

async fn run_sweep(config: &Config, max_age_secs: Option<u64>) -> Result<()> {
    let max_age = max_age_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.sweeper.max_age());
    let sweeper = Sweeper::new(
        config.workspace_root.clone(),
        config.sweeper.interval(),
        max_age,
    );

    let report = sweeper.sweep().await;

    println!(
        "Swept {}: {} scanned, {} removed, {} failed",
        sweeper.root().display(),
        report.scanned,
        report.removed,
        report.failed
    );

    if report.failed > 0 {
        anyhow::bail!("{} workspace(s) could not be removed", report.failed);
    }
    Ok(())
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    for id in config.language_ids() {
        let Ok(lang) = config.get_language(id) else {
            continue;
        };
        let lang_type = if lang.is_compiled() {
            "compiled"
        } else {
            "interpreted"
        };
        println!("  {:<15} {} ({})", id, lang.name, lang_type);
    }
}

fn show_config(config: &Config) {
    let limits = &config.default_limits;
    println!("Workspace root: {}", config.workspace_root.display());
    println!();
    println!("Default resource limits:");
    println!("  Timeout: {} ms", limits.timeout().as_millis());
    println!("  Output cap: {} bytes per stream", limits.output_cap());
    println!("  Grace period: {} ms", limits.grace_period().as_millis());
    println!();
    println!("Request limits:");
    println!("  Max code size: {} bytes", config.request_limits.max_code_bytes);
    println!("  Max input size: {} bytes", config.request_limits.max_input_bytes);
    println!();
    println!("Sweeper:");
    println!("  Enabled: {}", config.sweeper.enabled);
    println!("  Interval: {} s", config.sweeper.interval_secs);
    println!("  Max age: {} s", config.sweeper.max_age_secs);
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
