//! Windlass CLI and REST API entry point.
//!
//! Binary name: `windlass`
//!
//! Parses CLI arguments, initializes the database and services, then either
//! dispatches a one-shot command or starts the long-running surface: REST
//! API, worker pool, and stale-lock sweeper.

mod cli;
mod http;
mod state;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use state::AppState;
use windlass_core::worker::{generate_worker_id, run_sweeper, WorkerPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Serve { otel } = &cli.command {
        // The guard flushes buffered spans when serve() returns.
        let _telemetry = windlass_observe::init(*otel)
            .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {e}"))?;
        return serve().await;
    }

    // One-shot commands: log level from verbosity flags.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,windlass=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let state = AppState::init().await?;

    match cli.command {
        Commands::Serve { .. } => unreachable!("handled above"),

        Commands::Submit {
            workflow,
            input,
            idempotency_key,
        } => {
            cli::execution::submit(&state, &workflow, input.as_deref(), idempotency_key, cli.json)
                .await?;
        }

        Commands::List { status, limit } => {
            cli::execution::list(&state, status.as_deref(), limit, cli.json).await?;
        }

        Commands::Show { execution_id } => {
            cli::execution::show(&state, execution_id, cli.json).await?;
        }

        Commands::Cancel { execution_id } => {
            cli::execution::cancel(&state, execution_id, cli.json).await?;
        }

        Commands::Dlq => {
            cli::execution::dlq(&state, cli.json).await?;
        }

        Commands::Sweep => {
            cli::execution::sweep(&state, cli.json).await?;
        }
    }

    Ok(())
}

/// Long-running mode: REST API + worker pool + sweeper, all tied to one
/// shutdown token triggered by ctrl-c.
async fn serve() -> anyhow::Result<()> {
    let state = AppState::init().await?;
    let shutdown = CancellationToken::new();

    // Worker pool.
    let worker = WorkerPool::new(
        generate_worker_id(),
        state.config.worker.clone(),
        state.store.clone(),
        state.runner(),
        shutdown.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    // Stale-lock sweeper.
    let sweeper_handle = tokio::spawn(run_sweeper(
        state.store.clone(),
        state.config.claim.clone(),
        shutdown.clone(),
    ));

    // REST surface.
    let bind_addr = state.config.http.bind_addr.clone();
    let app = http::router::build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = bind_addr.as_str(), "REST API listening");

    // Ctrl-c trips the shared shutdown token; the server, workers and
    // sweeper all drain off the same signal.
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_shutdown.cancel();
        }
    });

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await?;

    shutdown.cancel();
    let _ = worker_handle.await;
    let _ = sweeper_handle.await;
    tracing::info!("shutdown complete");
    Ok(())
}
