use serde::Deserialize;

use crate::{
    error::{Result, StudioError},
    types::ModelKind,
};

#[derive(Debug, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub manifest: String,
}

#[derive(Debug, Deserialize)]
pub struct Registry {
    pub default: String,
    pub models: Vec<RegistryEntry>,
}

const REGISTRY_JSON: &str = include_str!("../models/registry.json");

/// Manifest URL for a configuration, from the embedded registry.
pub fn resolve_manifest_url(kind: ModelKind) -> Result<String> {
    let reg: Registry = serde_json::from_str(REGISTRY_JSON)?;

    reg.models
        .into_iter()
        .find(|m| m.name == kind.as_str())
        .map(|m| m.manifest)
        .ok_or_else(|| {
            StudioError::Registry(format!("model `{kind}` not found in registry"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_configuration() {
        for kind in ModelKind::ALL {
            let url = resolve_manifest_url(kind).unwrap();
            assert!(url.starts_with("https://"), "bad url for {kind}: {url}");
        }
    }

    #[test]
    fn registry_default_is_a_known_model() {
        let reg: Registry = serde_json::from_str(REGISTRY_JSON).unwrap();
        assert!(reg.models.iter().any(|m| m.name == reg.default));
    }
}
