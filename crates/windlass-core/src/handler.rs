//! Step handler trait and registry.
//!
//! A [`StepHandler`] executes one kind of step. Handlers are registered by
//! type tag in a process-wide [`HandlerRegistry`]; lookup is O(1) and
//! registration after workers have started is permitted.
//!
//! The trait is object-safe (boxed futures) so the registry can hold
//! heterogeneous handlers behind `Arc<dyn StepHandler>`.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde_json::Value;
use windlass_types::definition::StepDefinition;

use crate::context::StepContext;

// ---------------------------------------------------------------------------
// HandlerOutput / HandlerError
// ---------------------------------------------------------------------------

/// Successful handler result: the step output plus the successor chosen by
/// the handler (most handlers pass `step.next` through; `condition` picks a
/// branch).
#[derive(Debug, Clone)]
pub struct HandlerOutput {
    pub output: Value,
    pub next: Option<String>,
}

impl HandlerOutput {
    /// Output with the step's declared successor.
    pub fn with_next(output: Value, step: &StepDefinition) -> Self {
        Self {
            output,
            next: step.next.clone(),
        }
    }
}

/// Errors a handler can surface. The interpreter converts any of these into
/// a failed step result; it never panics the runner.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The step config is missing or malformed for this handler.
    #[error("invalid step config: {0}")]
    InvalidConfig(String),

    /// The step's work failed.
    #[error("{0}")]
    Failed(String),
}

// ---------------------------------------------------------------------------
// StepHandler
// ---------------------------------------------------------------------------

/// Executes a single kind of step.
///
/// Handlers must tolerate re-invocation: a crash between execution and
/// checkpointing replays the step on the next claim, and a timed-out
/// handler's in-flight work is abandoned, not killed. Long-running handlers
/// should honor `ctx.cancellation` and set their own deadlines on external
/// resources.
pub trait StepHandler: Send + Sync {
    /// The type tag this handler serves.
    fn step_type(&self) -> &'static str;

    /// Execute the step against the context.
    fn execute<'a>(
        &'a self,
        step: &'a StepDefinition,
        ctx: &'a StepContext,
    ) -> BoxFuture<'a, Result<HandlerOutput, HandlerError>>;
}

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

/// Process-wide mapping from step type tag to handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn StepHandler>>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the in-process built-ins (log, transform,
    /// condition, delay). The `http` handler lives in the infra layer and
    /// is registered by the host alongside these.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(crate::handlers::log::LogHandler));
        registry.register(Arc::new(crate::handlers::transform::TransformHandler));
        registry.register(Arc::new(crate::handlers::condition::ConditionHandler));
        registry.register(Arc::new(crate::handlers::delay::DelayHandler));
        registry
    }

    /// Register a handler under its type tag. Replaces any previous handler
    /// for the same tag.
    pub fn register(&self, handler: Arc<dyn StepHandler>) {
        self.handlers
            .insert(handler.step_type().to_string(), handler);
    }

    /// Look up the handler for a type tag.
    pub fn get(&self, step_type: &str) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(step_type).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
