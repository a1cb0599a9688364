//! CLI argument definitions.

pub mod execution;

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Windlass: durable workflow orchestrator.
#[derive(Debug, Parser)]
#[command(name = "windlass", version, about = "Durable workflow orchestrator")]
pub struct Cli {
    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Emit machine-readable JSON output.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the REST API, worker pool and stale-lock sweeper.
    Serve {
        /// Export spans via OpenTelemetry (stdout exporter).
        #[arg(long)]
        otel: bool,
    },

    /// Submit a trigger event for a workflow.
    Submit {
        /// Workflow name.
        workflow: String,
        /// JSON input payload (default: {}).
        #[arg(long)]
        input: Option<String>,
        /// Idempotency key for deduplication.
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// List executions.
    List {
        /// Filter by status (pending, running, retry_scheduled, completed,
        /// failed, cancelled).
        #[arg(long)]
        status: Option<String>,
        /// Maximum rows to return.
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },

    /// Show one execution with its step results and logs.
    Show {
        /// Execution id.
        execution_id: Uuid,
    },

    /// Cancel an execution.
    Cancel {
        /// Execution id.
        execution_id: Uuid,
    },

    /// List dead-letter entries.
    Dlq,

    /// Release claims held longer than the stale-lock threshold.
    Sweep,
}
