//! Workflow definition directory loader.
//!
//! The core consumes already-validated definitions through its resolver;
//! this module is the authoring-side collaborator that reads `*.json`
//! definitions from a directory, validates them (unique step ids,
//! resolvable `next`/`on_error` references, at least one step), and
//! registers them on a [`StaticResolver`].

use std::path::Path;

use windlass_core::resolver::StaticResolver;
use windlass_types::definition::PinnedDefinition;

/// Errors raised while loading or validating definitions. Surfaced to the
/// operator before the core is ever entered.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid definition '{name}': {message}")]
    Invalid { name: String, message: String },
}

/// Validate the resolver contract for a definition.
pub fn validate_definition(definition: &PinnedDefinition) -> Result<(), DefinitionError> {
    let invalid = |message: String| DefinitionError::Invalid {
        name: definition.name.clone(),
        message,
    };

    if definition.steps.is_empty() {
        return Err(invalid("definition has no steps".to_string()));
    }

    let mut seen = std::collections::HashSet::new();
    for step in &definition.steps {
        if step.id.is_empty() {
            return Err(invalid("step with empty id".to_string()));
        }
        if !seen.insert(step.id.as_str()) {
            return Err(invalid(format!("duplicate step id '{}'", step.id)));
        }
    }

    for step in &definition.steps {
        for (label, target) in [("next", &step.next), ("on_error", &step.on_error)] {
            if let Some(target) = target {
                if definition.step(target).is_none() {
                    return Err(invalid(format!(
                        "step '{}' {label} references unknown step '{target}'",
                        step.id
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Load and validate every `*.json` definition under `dir`. Missing
/// directories yield an empty set (a fresh install has no definitions yet).
pub async fn load_definitions(dir: &Path) -> Result<Vec<PinnedDefinition>, DefinitionError> {
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "no definitions directory, starting empty");
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(DefinitionError::Io {
                path: dir.display().to_string(),
                source: err,
            });
        }
    };

    let mut definitions = Vec::new();
    while let Some(entry) = read_dir.next_entry().await.map_err(|e| DefinitionError::Io {
        path: dir.display().to_string(),
        source: e,
    })? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DefinitionError::Io {
                path: path.display().to_string(),
                source: e,
            })?;

        let definition: PinnedDefinition =
            serde_json::from_str(&content).map_err(|e| DefinitionError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        validate_definition(&definition)?;
        tracing::info!(
            name = definition.name.as_str(),
            version = definition.version.as_str(),
            steps = definition.steps.len(),
            "loaded workflow definition"
        );
        definitions.push(definition);
    }

    Ok(definitions)
}

/// Load a directory of definitions into a fresh resolver.
pub async fn load_resolver(dir: &Path) -> Result<StaticResolver, DefinitionError> {
    let resolver = StaticResolver::new();
    for definition in load_definitions(dir).await? {
        resolver.register(definition);
    }
    Ok(resolver)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
