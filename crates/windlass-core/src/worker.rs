//! Worker pool: a long-lived poll loop that claims batches of due
//! executions and fans them out to runners.
//!
//! Each worker has a unique id, a concurrency cap C and a poll interval P.
//! Every tick it reaps finished runs, claims up to `C - |active|`
//! executions, and dispatches each onto a `JoinSet`. Workers are symmetric
//! and stateless across restarts: a crashed worker loses only its in-memory
//! active set, and its claims are recovered by resume-after-reclaim or the
//! stale-lock sweeper.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use windlass_types::config::{ClaimConfig, WorkerConfig};

use crate::resolver::DefinitionResolver;
use crate::runner::ExecutionRunner;
use crate::store::ExecutionStore;

// ---------------------------------------------------------------------------
// WorkerPool
// ---------------------------------------------------------------------------

/// One worker: claim loop plus bounded in-process fan-out.
pub struct WorkerPool<S, R> {
    worker_id: String,
    config: WorkerConfig,
    store: Arc<S>,
    runner: Arc<ExecutionRunner<S, R>>,
    shutdown: CancellationToken,
}

impl<S, R> WorkerPool<S, R>
where
    S: ExecutionStore + 'static,
    R: DefinitionResolver + 'static,
{
    pub fn new(
        worker_id: impl Into<String>,
        config: WorkerConfig,
        store: Arc<S>,
        runner: Arc<ExecutionRunner<S, R>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            config,
            store,
            runner,
            shutdown,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run the poll loop until shutdown, then drain active executions
    /// bounded by the stop deadline.
    pub async fn run(self) {
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let mut active: JoinSet<()> = JoinSet::new();

        tracing::info!(
            worker_id = self.worker_id.as_str(),
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval_ms,
            "worker started"
        );

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            // Reap finished runs to free slots.
            while active.try_join_next().is_some() {}

            let free = self.config.concurrency.saturating_sub(active.len());
            if free > 0 {
                match self.store.claim(&self.worker_id, free).await {
                    Ok(batch) => {
                        for execution in batch {
                            let runner = self.runner.clone();
                            let worker_id = self.worker_id.clone();
                            tracing::debug!(
                                worker_id = worker_id.as_str(),
                                execution_id = %execution.id,
                                "claimed execution"
                            );
                            active.spawn(async move {
                                if let Err(err) = runner.run(execution.id).await {
                                    tracing::error!(
                                        worker_id = worker_id.as_str(),
                                        execution_id = %execution.id,
                                        error = %err,
                                        "runner aborted; claim will be recovered by the sweeper"
                                    );
                                }
                            });
                        }
                    }
                    Err(err) => {
                        tracing::error!(
                            worker_id = self.worker_id.as_str(),
                            error = %err,
                            "claim failed"
                        );
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(poll) => {}
                _ = self.shutdown.cancelled() => break,
            }
        }

        // Graceful shutdown: stop claiming, drain what is in flight.
        let deadline = Duration::from_millis(self.config.stop_deadline_ms);
        tracing::info!(
            worker_id = self.worker_id.as_str(),
            in_flight = active.len(),
            "worker draining"
        );
        let drained = tokio::time::timeout(deadline, async {
            while active.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                worker_id = self.worker_id.as_str(),
                abandoned = active.len(),
                "stop deadline reached, abandoning in-flight executions"
            );
            active.abort_all();
        }

        tracing::info!(worker_id = self.worker_id.as_str(), "worker stopped");
    }
}

/// A generated worker id: stable for the life of the process, unique across
/// restarts and hosts.
pub fn generate_worker_id() -> String {
    format!("worker-{}", Uuid::now_v7())
}

// ---------------------------------------------------------------------------
// Stale-lock sweeper
// ---------------------------------------------------------------------------

/// Operator-level loop releasing claims left behind by dead workers: clears
/// worker ownership and restores status to pending once a lock is older
/// than the configured threshold. Not part of the per-request hot path.
pub async fn run_sweeper<S: ExecutionStore>(
    store: Arc<S>,
    config: ClaimConfig,
    shutdown: CancellationToken,
) {
    let interval = Duration::from_millis(config.sweep_interval_ms);
    tracing::info!(
        stale_lock_threshold_min = config.stale_lock_threshold_min,
        sweep_interval_ms = config.sweep_interval_ms,
        "stale-lock sweeper started"
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.cancelled() => break,
        }

        let threshold =
            Utc::now() - chrono::Duration::minutes(config.stale_lock_threshold_min as i64);
        match store.release_stale_locks(threshold).await {
            Ok(0) => {}
            Ok(released) => {
                tracing::warn!(released, "released stale claims");
            }
            Err(err) => {
                tracing::error!(error = %err, "stale-lock sweep failed");
            }
        }
    }

    tracing::info!("stale-lock sweeper stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
