use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tasksync_lib::{AppConfig, AppState, init_logging};
use tracing::info;

#[derive(Parser)]
#[command(name = "tasksync-daemon")]
#[command(about = "Offline-first sync engine for a local task cache", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database URL for the local cache
    #[arg(long, env = "TASKSYNC_DATABASE_URL")]
    database_url: Option<String>,

    /// Base URL of the remote REST store
    #[arg(long, env = "TASKSYNC_REMOTE_URL")]
    remote_url: Option<String>,

    /// Start as offline until the platform or probe reports connectivity
    #[arg(long)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep syncing in the background until Ctrl+C
    Run,
    /// Run a single sync cycle and print its outcome
    Sync,
    /// Print the engine status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let mut config = AppConfig::from_env();
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    if let Some(url) = cli.remote_url {
        config.remote.base_url = url.trim_end_matches('/').to_string();
    }
    if cli.offline {
        config.network.assume_online = false;
    }

    info!("Starting tasksync daemon v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Sync => sync_once(config).await,
        Commands::Status => print_status(config).await,
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let state = AppState::initialize(config)
        .await
        .context("failed to start sync engine")?;

    info!("Sync engine is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down sync engine...");

    state.shutdown().await;
    Ok(())
}

async fn sync_once(mut config: AppConfig) -> Result<()> {
    config.sync.auto_sync = false;
    config.sync.sync_on_start = false;
    let state = AppState::initialize(config)
        .await
        .context("failed to start sync engine")?;

    let outcome = state.scheduler.sync_now().await;
    state.shutdown().await;

    let outcome = outcome.context("sync cycle failed")?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn print_status(mut config: AppConfig) -> Result<()> {
    config.sync.auto_sync = false;
    config.sync.sync_on_start = false;
    let state = AppState::initialize(config)
        .await
        .context("failed to start sync engine")?;

    let status = state.access.status().await;
    let report = state.recovery_report.clone();
    state.shutdown().await;

    let output = serde_json::json!({
        "status": status.context("failed to read engine status")?,
        "recovery": report,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
