//! Step execution context.
//!
//! [`StepContext`] is the state a handler sees: the execution id, the
//! accumulated state map (step_id -> output, seeded from the trigger
//! input), a log collector, and a cancellation token handlers may honor to
//! short-circuit work the runner is going to abandon anyway.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use windlass_types::execution::ExecutionLogEntry;

// ---------------------------------------------------------------------------
// State helpers
// ---------------------------------------------------------------------------

/// Seed the state map from the trigger input, merged with any persisted
/// output snapshot from prior attempts.
///
/// Object inputs are merged key-by-key; a non-object input is stored under
/// the `"input"` key so dotted paths can still address it. Snapshot entries
/// win over input keys (they are the more recent writes).
pub fn seed_state(input: &Value, snapshot: Option<&Value>) -> Map<String, Value> {
    let mut state = Map::new();
    match input {
        Value::Object(fields) => {
            for (k, v) in fields {
                state.insert(k.clone(), v.clone());
            }
        }
        Value::Null => {}
        other => {
            state.insert("input".to_string(), other.clone());
        }
    }
    if let Some(Value::Object(fields)) = snapshot {
        for (k, v) in fields {
            state.insert(k.clone(), v.clone());
        }
    }
    state
}

/// Resolve a dotted path (`"fetch-data.statusCode"`) against a state map.
/// Missing segments resolve to `None`.
pub fn lookup_path<'a>(state: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = state.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

// ---------------------------------------------------------------------------
// LogCollector
// ---------------------------------------------------------------------------

/// Shared collector for log lines produced during a run. The runner drains
/// it into the store at checkpoints; handlers only append.
#[derive(Debug, Clone, Default)]
pub struct LogCollector {
    entries: Arc<Mutex<Vec<ExecutionLogEntry>>>,
}

impl LogCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line.
    pub fn push(&self, execution_id: Uuid, step_id: Option<&str>, level: &str, message: &str) {
        let entry = ExecutionLogEntry {
            id: Uuid::now_v7(),
            execution_id,
            step_id: step_id.map(str::to_string),
            level: level.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        };
        self.entries.lock().expect("log collector poisoned").push(entry);
    }

    /// Take all collected lines, leaving the collector empty.
    pub fn drain(&self) -> Vec<ExecutionLogEntry> {
        std::mem::take(&mut *self.entries.lock().expect("log collector poisoned"))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("log collector poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// StepContext
// ---------------------------------------------------------------------------

/// Everything a step handler may read while executing.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// The execution this step belongs to.
    pub execution_id: Uuid,
    /// Accumulated state: step_id -> output, seeded with the trigger input.
    pub state: Map<String, Value>,
    /// Collector for `log`-handler lines and runner notices.
    pub logs: LogCollector,
    /// Cancelled when the runner observes execution cancellation. Handlers
    /// doing long work should select against it.
    pub cancellation: CancellationToken,
}

impl StepContext {
    pub fn new(execution_id: Uuid, state: Map<String, Value>) -> Self {
        Self {
            execution_id,
            state,
            logs: LogCollector::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Dotted-path lookup into the state map.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.state, path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
