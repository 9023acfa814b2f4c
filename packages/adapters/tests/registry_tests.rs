//! Integration tests for the adapter registry and the built-in dialects

use pen_adapters::{
    Adapter, AdapterContext, AdapterError, AdapterFactory, AdapterMeta, AdapterRegistry, AdapterResult, AdapterType,
    CompileError, Fragment, Schema, TemplateVars,
};
use pen_common::{FileMap, Settings};
use serde_json::json;
use std::sync::Arc;

static SHOUT_META: AdapterMeta = AdapterMeta {
    id: "shout",
    adapter_type: AdapterType::Markup,
    name: "Shout",
    description: "Upper-cases its input",
    extends: None,
    file_extension: ".shout",
    mime_type: "text/x-shout",
    compile_targets: &[],
    can_minify: false,
};

struct ShoutFactory;

struct ShoutAdapter {
    settings: Settings,
}

impl AdapterFactory for ShoutFactory {
    fn meta(&self) -> &'static AdapterMeta {
        &SHOUT_META
    }

    fn default_settings(&self) -> Settings {
        Settings::new()
    }

    fn schema(&self) -> Schema {
        Schema::new()
    }

    fn default_template(&self, _vars: &TemplateVars) -> String {
        "hello".to_string()
    }

    fn create(&self, settings: Settings, _ctx: &AdapterContext) -> Box<dyn Adapter> {
        Box::new(ShoutAdapter { settings })
    }
}

impl Adapter for ShoutAdapter {
    fn meta(&self) -> &'static AdapterMeta {
        &SHOUT_META
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn render(&self, filename: &str, content: &str, _files: &FileMap) -> AdapterResult<Fragment> {
        if content.contains('!') {
            return Err(CompileError::new("shout", filename, "Already shouting").at(1, 1).into());
        }
        Ok(Fragment::markup(content.to_uppercase()))
    }

    fn beautify(&self, _filename: &str, content: &str) -> AdapterResult<String> {
        Ok(content.to_string())
    }
}

#[test]
fn test_custom_adapter_registration() {
    let mut registry = AdapterRegistry::with_defaults();
    registry.register(Arc::new(ShoutFactory));

    assert!(registry.contains("shout"));
    assert_eq!(registry.ids().last(), Some("shout"));

    let adapter = registry
        .get("shout")
        .unwrap()
        .instantiate(&Settings::new(), &AdapterContext::default());
    let fragment = adapter.render("a.shout", "hi", &FileMap::new()).unwrap();
    assert_eq!(fragment, Fragment::markup("HI"));

    let err = adapter.render("a.shout", "hi!", &FileMap::new()).unwrap_err();
    assert_eq!(err.name(), "CompileError");
    assert_eq!(err.position(), (Some(1), Some(1)));
}

#[test]
fn test_every_dialect_renders_its_template() {
    let registry = AdapterRegistry::with_defaults();
    let ctx = AdapterContext::default();
    let mut vars = TemplateVars::new();
    vars.insert("projectName".to_string(), "Demo".to_string());

    for meta in registry.all_metadata() {
        let factory = registry.get(&meta.id).unwrap();
        let template = factory.default_template(&vars);
        assert!(!template.contains("{projectName}"), "{}", meta.id);

        let adapter = factory.instantiate(&Settings::new(), &ctx);
        let filename = format!("main{}", meta.file_extension);
        let fragment = adapter
            .render(&filename, &template, &FileMap::new())
            .unwrap_or_else(|e| panic!("{} template failed: {e}", meta.id));

        let kind = match fragment {
            Fragment::Markup { .. } => AdapterType::Markup,
            Fragment::Style { .. } => AdapterType::Style,
            Fragment::Script { .. } => AdapterType::Script,
        };
        assert_eq!(kind, meta.adapter_type, "{}", meta.id);
    }
}

#[test]
fn test_minify_capability_matches_metadata() {
    let registry = AdapterRegistry::with_defaults();
    let ctx = AdapterContext::default();

    for meta in registry.all_metadata() {
        let adapter = registry.get(&meta.id).unwrap().instantiate(&Settings::new(), &ctx);
        let result = adapter.minify("x", "");
        let unsupported = matches!(result, Err(AdapterError::Unsupported { .. }));
        assert_eq!(!unsupported, meta.can_minify, "{}", meta.id);
    }
}

#[test]
fn test_editor_settings_override_defaults() {
    let registry = AdapterRegistry::with_defaults();
    let overrides: Settings = serde_json::from_value(json!({ "moduleType": "classic" })).unwrap();
    let adapter = registry
        .get("typescript")
        .unwrap()
        .instantiate(&overrides, &AdapterContext::default());

    assert_eq!(adapter.settings()["moduleType"], "classic");
    assert_eq!(adapter.settings()["target"], "ES2022");
}
