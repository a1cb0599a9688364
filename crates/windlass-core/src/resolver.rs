//! Workflow definition resolution.
//!
//! The execution subsystem never authors or validates definitions; it asks a
//! [`DefinitionResolver`] for an already-validated, version-pinned
//! definition. [`StaticResolver`] is the in-process implementation the hosts
//! seed at startup (from a definition directory, an admin API, etc.).

use dashmap::DashMap;
use windlass_types::definition::PinnedDefinition;

/// Resolves workflow names to pinned definitions.
pub trait DefinitionResolver: Send + Sync {
    /// Resolve a definition by name, optionally pinning an exact version.
    /// With `version: None` the latest registered version wins.
    fn resolve(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> impl std::future::Future<Output = Option<PinnedDefinition>> + Send;
}

/// Registry-backed resolver: name -> registered versions, newest last.
#[derive(Default, Debug)]
pub struct StaticResolver {
    definitions: DashMap<String, Vec<PinnedDefinition>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. A re-registered (name, version) pair replaces
    /// the previous entry; otherwise the new version is appended as latest.
    pub fn register(&self, definition: PinnedDefinition) {
        let mut versions = self
            .definitions
            .entry(definition.name.clone())
            .or_default();
        if let Some(existing) = versions
            .iter_mut()
            .find(|d| d.version == definition.version)
        {
            *existing = definition;
        } else {
            versions.push(definition);
        }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl DefinitionResolver for StaticResolver {
    async fn resolve(&self, name: &str, version: Option<&str>) -> Option<PinnedDefinition> {
        let versions = self.definitions.get(name)?;
        match version {
            Some(v) => versions.iter().find(|d| d.version == v).cloned(),
            None => versions.last().cloned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
