//! tickflow - Tick-driven Job Scheduler
//!
//! A long-running scheduler daemon: jobs are declared in a YAML file, bound
//! to registered callables, and driven by cron/interval/one-off schedules or
//! by data arriving on list and RabbitMQ inputs.

use std::sync::Arc;

use tickflow::api::{ApiServerConfig, AppState, server::start_server};
use tickflow::config::AppConfig;
use tickflow::logging::init_logging;
use tickflow::registry::{Registry, install_builtins};
use tickflow::scheduler::Scheduler;
use tracing::{error, info};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging before anything can fail.
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let _guard = init_logging(&log_dir)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting tickflow v{}", env!("CARGO_PKG_VERSION"));

    // Load environment variables
    dotenvy::dotenv().ok();

    // Load job and input definitions
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "jobs.yaml".to_string());
    info!("Loading definitions from {config_path}");
    let (scheduler_config, inputs, jobs) = AppConfig::load(&config_path)?.into_definitions()?;
    info!(jobs = jobs.len(), inputs = inputs.len(), "Definitions loaded");

    // Populate the callable registry. Embedding applications register their
    // own targets here; the binary ships with the built-ins only.
    let mut registry = Registry::new();
    install_builtins(&mut registry);

    let scheduler = Arc::new(Scheduler::with_config(
        jobs,
        inputs,
        registry,
        scheduler_config,
    )?);
    let cancellation_token = scheduler.cancellation_token();

    // Start the API server
    let api_config = ApiServerConfig::from_env_or_default();
    let api_handle = start_server(
        api_config,
        AppState::new(scheduler.clone()),
        cancellation_token.clone(),
    )
    .await?;

    // Drive the scheduler loop
    let scheduler_task = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            if let Err(e) = scheduler.run().await {
                error!("Scheduler error: {e}");
            }
        })
    };

    info!("tickflow started successfully");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating shutdown...");
        }
        _ = wait_for_sigterm() => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Graceful shutdown: stop dispatching, let in-flight attempts finish.
    cancellation_token.cancel();
    if let Err(e) = scheduler_task.await {
        error!("Scheduler task join error: {e}");
    }
    if let Err(e) = api_handle.await {
        error!("API task join error: {e}");
    }

    info!("tickflow shutdown complete");
    Ok(())
}

/// Wait for SIGTERM signal (Unix only).
#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to register SIGTERM handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}

/// Wait for SIGTERM signal (non-Unix - the ctrl_c handler above covers it).
#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
