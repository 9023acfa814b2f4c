use crate::cache::CompilerCache;
use crate::error::AdapterResult;
use pen_common::{FileMap, Settings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Composition slot an adapter's output lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    Markup,
    Style,
    Script,
    Other,
}

impl AdapterType {
    /// Injection order: markup, then styles, then scripts
    pub fn order(self) -> u8 {
        match self {
            AdapterType::Markup => 0,
            AdapterType::Style => 1,
            AdapterType::Script => 2,
            AdapterType::Other => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdapterType::Markup => "markup",
            AdapterType::Style => "style",
            AdapterType::Script => "script",
            AdapterType::Other => "other",
        }
    }
}

/// Static identity of a dialect
#[derive(Debug, Clone, Copy)]
pub struct AdapterMeta {
    pub id: &'static str,
    pub adapter_type: AdapterType,
    pub name: &'static str,
    pub description: &'static str,
    /// Id of the dialect this one builds on
    pub extends: Option<&'static str>,
    pub file_extension: &'static str,
    pub mime_type: &'static str,
    pub compile_targets: &'static [&'static str],
    pub can_minify: bool,
}

/// UI description of one recognized setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub default: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl SettingSchema {
    pub fn boolean(name: &str, description: &str, default: bool) -> Self {
        Self::new("boolean", name, description, Value::Bool(default), None)
    }

    pub fn text(name: &str, description: &str, default: &str) -> Self {
        Self::new("text", name, description, Value::from(default), None)
    }

    pub fn select(name: &str, description: &str, default: &str, options: &[&str]) -> Self {
        Self::new(
            "select",
            name,
            description,
            Value::from(default),
            Some(options.iter().map(|o| o.to_string()).collect()),
        )
    }

    fn new(
        kind: &str,
        name: &str,
        description: &str,
        default: Value,
        options: Option<Vec<String>>,
    ) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            default,
            options,
        }
    }
}

pub type Schema = BTreeMap<String, SettingSchema>;

/// External scripts and stylesheets a dialect needs at runtime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnResources {
    pub scripts: Vec<String>,
    pub styles: Vec<String>,
}

/// Normalized output of `Adapter::render`
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Markup {
        body_content: String,
        head_content: String,
        html_attributes: BTreeMap<String, String>,
    },
    Style {
        css: String,
        /// Source map JSON
        map: Option<String>,
        style_type: String,
    },
    Script {
        js: String,
        /// Source map JSON
        map: Option<String>,
    },
}

impl Fragment {
    pub fn markup(body_content: impl Into<String>) -> Self {
        Fragment::Markup {
            body_content: body_content.into(),
            head_content: String::new(),
            html_attributes: BTreeMap::new(),
        }
    }

    pub fn css(css: impl Into<String>) -> Self {
        Fragment::Style {
            css: css.into(),
            map: None,
            style_type: "text/css".to_string(),
        }
    }

    pub fn script(js: impl Into<String>, map: Option<String>) -> Self {
        Fragment::Script { js: js.into(), map }
    }
}

/// Output of `Adapter::compile_to`
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub code: String,
    pub map: Option<String>,
}

/// Process-owned state handed to adapter instances
#[derive(Debug, Clone, Default)]
pub struct AdapterContext {
    pub cache: Arc<CompilerCache>,
}

impl AdapterContext {
    pub fn new(cache: Arc<CompilerCache>) -> Self {
        Self { cache }
    }
}

/// One dialect, instantiated with the settings of one editor
pub trait Adapter: Send {
    fn meta(&self) -> &'static AdapterMeta;

    fn settings(&self) -> &Settings;

    /// Compile `content` into a fragment; dialect failures are `CompileError`s
    fn render(&self, filename: &str, content: &str, files: &FileMap) -> AdapterResult<Fragment>;

    fn beautify(&self, filename: &str, content: &str) -> AdapterResult<String>;

    fn minify(&self, _filename: &str, _content: &str) -> AdapterResult<String> {
        Err(crate::AdapterError::unsupported(self.meta().id, "minify"))
    }

    /// Compile to one of `meta().compile_targets`
    fn compile_to(&self, _filename: &str, target: &str, _content: &str) -> AdapterResult<Compiled> {
        Err(crate::AdapterError::unsupported(
            self.meta().id,
            format!("compile to {target}"),
        ))
    }
}

/// Static side of a dialect: identity, defaults and construction
pub trait AdapterFactory: Send + Sync {
    fn meta(&self) -> &'static AdapterMeta;

    fn default_settings(&self) -> Settings;

    fn schema(&self) -> Schema;

    /// Starter content for a new file; `{projectName}` is substituted
    fn default_template(&self, vars: &TemplateVars) -> String;

    fn cdn_resources(&self, _settings: &Settings) -> CdnResources {
        CdnResources::default()
    }

    /// Build an instance from fully merged settings
    fn create(&self, settings: Settings, ctx: &AdapterContext) -> Box<dyn Adapter>;

    /// Merge `overrides` over the defaults and build an instance
    fn instantiate(&self, overrides: &Settings, ctx: &AdapterContext) -> Box<dyn Adapter> {
        let mut settings = self.default_settings();
        merge_settings(&mut settings, overrides);
        self.create(settings, ctx)
    }
}

pub type TemplateVars = BTreeMap<String, String>;

/// Substitute `{key}` placeholders; `projectName` falls back to "Pen"
pub fn render_template(template: &str, vars: &TemplateVars) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out.replace("{projectName}", "Pen")
}

/// Shallow merge, later keys win
pub fn merge_settings(base: &mut Settings, overrides: &Settings) {
    for (key, value) in overrides {
        base.insert(key.clone(), value.clone());
    }
}

pub fn setting_str<'a>(settings: &'a Settings, key: &str) -> Option<&'a str> {
    settings.get(key).and_then(Value::as_str)
}

pub fn setting_bool(settings: &Settings, key: &str) -> bool {
    settings.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Build a settings object from literal pairs
pub fn settings_from(pairs: &[(&str, Value)]) -> Settings {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_order() {
        let mut types = vec![AdapterType::Other, AdapterType::Script, AdapterType::Markup, AdapterType::Style];
        types.sort_by_key(|t| t.order());
        assert_eq!(
            types,
            vec![AdapterType::Markup, AdapterType::Style, AdapterType::Script, AdapterType::Other]
        );
    }

    #[test]
    fn test_render_template() {
        let mut vars = TemplateVars::new();
        assert_eq!(render_template("<h1>{projectName}</h1>", &vars), "<h1>Pen</h1>");

        vars.insert("projectName".to_string(), "Demo".to_string());
        assert_eq!(
            render_template("a { color: red } /* {projectName} */", &vars),
            "a { color: red } /* Demo */"
        );
    }

    #[test]
    fn test_merge_settings() {
        let mut base = settings_from(&[("moduleType", json!("module")), ("strict", json!(true))]);
        let overrides = settings_from(&[("moduleType", json!("classic"))]);
        merge_settings(&mut base, &overrides);

        assert_eq!(setting_str(&base, "moduleType"), Some("classic"));
        assert!(setting_bool(&base, "strict"));
        assert!(!setting_bool(&base, "missing"));
    }

    #[test]
    fn test_schema_serialization() {
        let schema = SettingSchema::select("Script Type", "Module type", "module", &["module", "classic"]);
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["type"], "select");
        assert_eq!(value["options"], json!(["module", "classic"]));
    }
}
