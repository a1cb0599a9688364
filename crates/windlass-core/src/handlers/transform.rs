//! `transform` step handler: reshapes accumulated state via dotted paths.

use std::collections::BTreeMap;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Map, Value};
use windlass_types::definition::StepDefinition;

use crate::context::StepContext;
use crate::handler::{HandlerError, HandlerOutput, StepHandler};

#[derive(Debug, Deserialize)]
struct TransformConfig {
    /// Output key -> dotted path into the state map.
    mapping: BTreeMap<String, String>,
}

/// Reads each dotted path in `config.mapping` from the context state and
/// assembles the output object. Paths that do not resolve are simply absent
/// from the output.
pub struct TransformHandler;

impl StepHandler for TransformHandler {
    fn step_type(&self) -> &'static str {
        "transform"
    }

    fn execute<'a>(
        &'a self,
        step: &'a StepDefinition,
        ctx: &'a StepContext,
    ) -> BoxFuture<'a, Result<HandlerOutput, HandlerError>> {
        Box::pin(async move {
            let config: TransformConfig = serde_json::from_value(step.config.clone())
                .map_err(|e| HandlerError::InvalidConfig(e.to_string()))?;

            let mut output = Map::new();
            for (out_key, path) in &config.mapping {
                if let Some(value) = ctx.lookup(path) {
                    output.insert(out_key.clone(), value.clone());
                }
            }

            Ok(HandlerOutput::with_next(Value::Object(output), step))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
