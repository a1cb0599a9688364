//! `log` step handler: appends a message to the execution log.

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use windlass_types::definition::StepDefinition;

use crate::context::StepContext;
use crate::handler::{HandlerError, HandlerOutput, StepHandler};

#[derive(Debug, Deserialize)]
struct LogConfig {
    message: String,
    #[serde(default = "default_level")]
    level: String,
}

fn default_level() -> String {
    "info".to_string()
}

/// Appends `config.message` at `config.level` (default "info") to the
/// execution's log collector and returns `{logged: true}`.
pub struct LogHandler;

impl StepHandler for LogHandler {
    fn step_type(&self) -> &'static str {
        "log"
    }

    fn execute<'a>(
        &'a self,
        step: &'a StepDefinition,
        ctx: &'a StepContext,
    ) -> BoxFuture<'a, Result<HandlerOutput, HandlerError>> {
        Box::pin(async move {
            let config: LogConfig = serde_json::from_value(step.config.clone())
                .map_err(|e| HandlerError::InvalidConfig(e.to_string()))?;

            ctx.logs
                .push(ctx.execution_id, Some(&step.id), &config.level, &config.message);
            tracing::info!(
                execution_id = %ctx.execution_id,
                step_id = step.id.as_str(),
                level = config.level.as_str(),
                message = config.message.as_str(),
                "log step"
            );

            Ok(HandlerOutput::with_next(json!({"logged": true}), step))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
