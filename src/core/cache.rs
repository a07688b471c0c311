use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{core::engine::Engine, error::Result, types::ModelKind};

/// Holds at most one loaded [`Engine`] per configuration.
///
/// Check-and-populate under the lock: the first caller for a configuration
/// pays the load cost while later callers for any configuration wait, which
/// is acceptable for a three-entry key space where each load happens once
/// per process lifetime. No eviction.
pub struct EngineCache {
    manifest_url_override: Option<String>,
    engines: Mutex<HashMap<ModelKind, Arc<Engine>>>,
}

impl EngineCache {
    pub fn new() -> Self {
        Self::with_manifest_override(None)
    }

    /// Cache whose engines fetch manifests from `override_url` instead of
    /// the embedded registry. Used by tests against a local mock server.
    pub fn with_manifest_override(override_url: Option<String>) -> Self {
        Self {
            manifest_url_override: override_url,
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// The engine for `kind`, loading it on first request.
    pub fn get(&self, kind: ModelKind) -> Result<Arc<Engine>> {
        let mut engines = self.engines.lock().expect("engine cache poisoned");

        if let Some(engine) = engines.get(&kind) {
            return Ok(Arc::clone(engine));
        }

        let engine = Arc::new(Engine::load(kind, self.manifest_url_override.as_deref())?);
        engines.insert(kind, Arc::clone(&engine));
        Ok(engine)
    }

    /// Configurations currently loaded.
    pub fn loaded(&self) -> Vec<ModelKind> {
        let engines = self.engines.lock().expect("engine cache poisoned");
        let mut kinds: Vec<ModelKind> = engines.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

impl Default for EngineCache {
    fn default() -> Self {
        Self::new()
    }
}
