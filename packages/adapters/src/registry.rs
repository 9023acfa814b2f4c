use crate::adapter::{AdapterFactory, AdapterType, Schema};
use crate::dialects;
use crate::error::{RegistryError, RegistryResult};
use serde::Serialize;
use std::sync::Arc;

/// Serializable description of a registered dialect
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterMetadata {
    pub id: String,
    #[serde(rename = "type")]
    pub adapter_type: AdapterType,
    pub name: String,
    pub description: String,
    pub extends: Option<String>,
    pub file_extension: String,
    pub mime_type: String,
    pub compile_targets: Vec<String>,
    pub can_minify: bool,
    pub schema: Schema,
}

impl AdapterMetadata {
    fn of(factory: &dyn AdapterFactory) -> Self {
        let meta = factory.meta();
        Self {
            id: meta.id.to_string(),
            adapter_type: meta.adapter_type,
            name: meta.name.to_string(),
            description: meta.description.to_string(),
            extends: meta.extends.map(str::to_string),
            file_extension: meta.file_extension.to_string(),
            mime_type: meta.mime_type.to_string(),
            compile_targets: meta.compile_targets.iter().map(|t| t.to_string()).collect(),
            can_minify: meta.can_minify,
            schema: factory.schema(),
        }
    }
}

/// Dialect id → factory lookup, in registration order
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: Vec<Arc<dyn AdapterFactory>>,
}

impl AdapterRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in dialect
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for factory in dialects::builtin() {
            registry.register(factory);
        }
        registry
    }

    /// Add a dialect; a later registration with the same id replaces the earlier one
    pub fn register(&mut self, factory: Arc<dyn AdapterFactory>) {
        let id = factory.meta().id;
        if let Some(slot) = self.factories.iter_mut().find(|f| f.meta().id == id) {
            tracing::debug!(adapter = id, "Replacing registered adapter");
            *slot = factory;
        } else {
            self.factories.push(factory);
        }
    }

    pub fn get(&self, id: &str) -> RegistryResult<Arc<dyn AdapterFactory>> {
        self.factories
            .iter()
            .find(|f| f.meta().id == id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownAdapter(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.iter().any(|f| f.meta().id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.iter().map(|f| f.meta().id)
    }

    pub fn all_metadata(&self) -> Vec<AdapterMetadata> {
        self.factories
            .iter()
            .map(|f| AdapterMetadata::of(f.as_ref()))
            .collect()
    }

    pub fn metadata_by_type(&self, adapter_type: AdapterType) -> Vec<AdapterMetadata> {
        self.factories
            .iter()
            .filter(|f| f.meta().adapter_type == adapter_type)
            .map(|f| AdapterMetadata::of(f.as_ref()))
            .collect()
    }

    pub fn metadata(&self, id: &str) -> RegistryResult<AdapterMetadata> {
        self.get(id).map(|f| AdapterMetadata::of(f.as_ref()))
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids() {
        let registry = AdapterRegistry::with_defaults();
        let ids: Vec<_> = registry.ids().collect();
        assert_eq!(
            ids,
            vec![
                "html",
                "markdown",
                "pug",
                "slim",
                "css",
                "sass",
                "scss",
                "javascript",
                "typescript",
                "jsx",
                "tsx",
                "python"
            ]
        );
    }

    #[test]
    fn test_unknown_adapter() {
        let registry = AdapterRegistry::with_defaults();
        match registry.get("coffeescript") {
            Err(RegistryError::UnknownAdapter(id)) => assert_eq!(id, "coffeescript"),
            Ok(_) => panic!("expected UnknownAdapter"),
        }
        assert!(registry.metadata("nope").is_err());
    }

    #[test]
    fn test_metadata_by_type() {
        let registry = AdapterRegistry::with_defaults();
        let styles: Vec<_> = registry
            .metadata_by_type(AdapterType::Style)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(styles, vec!["css", "sass", "scss"]);

        let ts = registry.metadata("typescript").unwrap();
        assert_eq!(ts.extends.as_deref(), Some("javascript"));
        assert_eq!(ts.compile_targets, vec!["javascript"]);
        assert!(ts.schema.contains_key("target"));
    }

    #[test]
    fn test_metadata_json_shape() {
        let registry = AdapterRegistry::with_defaults();
        let json = serde_json::to_value(registry.metadata("sass").unwrap()).unwrap();
        assert_eq!(json["type"], "style");
        assert_eq!(json["fileExtension"], ".sass");
        assert_eq!(json["canMinify"], true);
        assert_eq!(json["extends"], "css");
    }
}
