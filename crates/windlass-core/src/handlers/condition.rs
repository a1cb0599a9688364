//! `condition` step handler: branches on a field of the accumulated state.

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use windlass_types::definition::StepDefinition;

use crate::context::StepContext;
use crate::handler::{HandlerError, HandlerOutput, StepHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Contains,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConditionConfig {
    /// Dotted path into the state map.
    field: String,
    operator: Operator,
    value: Value,
    #[serde(default)]
    on_true: Option<String>,
    #[serde(default)]
    on_false: Option<String>,
}

/// Reads `config.field` from state, compares it against `config.value` with
/// `config.operator`, and selects `onTrue` or `onFalse` as the successor.
/// Numeric operators (`gt`, `lt`) coerce both operands to numbers; a
/// non-coercible operand makes the comparison false.
pub struct ConditionHandler;

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn evaluate(actual: Option<&Value>, operator: Operator, expected: &Value) -> bool {
    match operator {
        Operator::Eq => actual == Some(expected),
        Operator::Ne => actual != Some(expected),
        Operator::Gt => match (actual.and_then(as_number), as_number(expected)) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        },
        Operator::Lt => match (actual.and_then(as_number), as_number(expected)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        },
        Operator::Contains => match actual {
            Some(Value::String(haystack)) => expected
                .as_str()
                .is_some_and(|needle| haystack.contains(needle)),
            Some(Value::Array(items)) => items.contains(expected),
            _ => false,
        },
    }
}

impl StepHandler for ConditionHandler {
    fn step_type(&self) -> &'static str {
        "condition"
    }

    fn execute<'a>(
        &'a self,
        step: &'a StepDefinition,
        ctx: &'a StepContext,
    ) -> BoxFuture<'a, Result<HandlerOutput, HandlerError>> {
        Box::pin(async move {
            let config: ConditionConfig = serde_json::from_value(step.config.clone())
                .map_err(|e| HandlerError::InvalidConfig(e.to_string()))?;

            let actual = ctx.lookup(&config.field);
            let condition = evaluate(actual, config.operator, &config.value);
            let next = if condition {
                config.on_true
            } else {
                config.on_false
            };

            tracing::debug!(
                execution_id = %ctx.execution_id,
                step_id = step.id.as_str(),
                field = config.field.as_str(),
                condition,
                next = next.as_deref().unwrap_or("<end>"),
                "condition evaluated"
            );

            Ok(HandlerOutput {
                output: json!({"condition": condition}),
                next,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
