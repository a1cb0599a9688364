//! `delay` step handler: sleeps for a configured duration.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use windlass_types::definition::StepDefinition;

use crate::context::StepContext;
use crate::handler::{HandlerError, HandlerOutput, StepHandler};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DelayConfig {
    duration_ms: u64,
}

/// Sleeps for `config.durationMs` and returns `{delayed: true}`. A delay
/// longer than the step timeout loses the interpreter's timeout race, which
/// is the expected way to exercise timeout behavior.
pub struct DelayHandler;

impl StepHandler for DelayHandler {
    fn step_type(&self) -> &'static str {
        "delay"
    }

    fn execute<'a>(
        &'a self,
        step: &'a StepDefinition,
        ctx: &'a StepContext,
    ) -> BoxFuture<'a, Result<HandlerOutput, HandlerError>> {
        Box::pin(async move {
            let config: DelayConfig = serde_json::from_value(step.config.clone())
                .map_err(|e| HandlerError::InvalidConfig(e.to_string()))?;

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(config.duration_ms)) => {}
                _ = ctx.cancellation.cancelled() => {
                    return Err(HandlerError::Failed("delay cancelled".to_string()));
                }
            }

            Ok(HandlerOutput::with_next(json!({"delayed": true}), step))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
