//! JobLease Server: lease-based job worker daemon
//!
//! Main entry point that opens the job store, starts the worker runner and
//! the lease recovery scheduler, and shuts both down on SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use joblease_core::clock::{Clock, SystemClock};
use joblease_core::config::{AppConfig, LogFormat};
use joblease_core::error::AppError;
use joblease_core::types::WorkerId;
use joblease_worker::jobs::{EchoJobHandler, SleepJobHandler};
use joblease_worker::{JobExecutor, JobQueue, LeaseManager, RecoveryScheduler, WorkerRunner};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("JOBLEASE_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    AppConfig::load(&config_path)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.log_format().unwrap_or(LogFormat::Json) {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting JobLease v{}", env!("CARGO_PKG_VERSION"));

    // ── Job store ────────────────────────────────────────────────
    let store = joblease_database::open_store(&config.database).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let leases = Arc::new(LeaseManager::new(Arc::clone(&store), Arc::clone(&clock)));
    let queue = Arc::new(JobQueue::new(
        store,
        clock,
        config.lease.default_max_attempts,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Worker runner ────────────────────────────────────────────
    let worker_handle = if config.worker.enabled {
        let worker_id = config
            .worker
            .worker_id
            .clone()
            .map(WorkerId::new)
            .unwrap_or_else(|| WorkerId::generate("worker"));

        let mut executor = JobExecutor::new();
        executor.register(Arc::new(EchoJobHandler));
        executor.register(Arc::new(SleepJobHandler));

        let runner = WorkerRunner::new(
            Arc::clone(&leases),
            Arc::new(executor),
            config.worker.clone(),
            config.lease.clone(),
            worker_id,
        );

        let worker_cancel = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            runner.run(worker_cancel).await;
        }))
    } else {
        tracing::info!("Worker disabled");
        None
    };

    // ── Recovery scheduler ───────────────────────────────────────
    let scheduler = if config.recovery.enabled {
        let scheduler =
            RecoveryScheduler::new(Arc::clone(&leases), Arc::clone(&queue), config.recovery.clone())
                .await?;
        scheduler.register_default_tasks().await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Lease recovery disabled in this process");
        None
    };

    if worker_handle.is_none() && scheduler.is_none() {
        tracing::warn!("Neither worker nor recovery is enabled; nothing to do");
    }

    // ── Graceful shutdown ────────────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Some(scheduler) = scheduler {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Scheduler shutdown failed: {}", e);
        }
    }

    if let Some(handle) = worker_handle {
        let grace = Duration::from_secs(config.worker.shutdown_grace_seconds + 5);
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!("Worker did not stop within the shutdown grace period");
        }
    }

    tracing::info!("JobLease server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
