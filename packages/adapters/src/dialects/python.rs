use crate::adapter::{
    render_template, settings_from, Adapter, AdapterContext, AdapterFactory, AdapterMeta, AdapterType, CdnResources,
    Fragment, Schema, SettingSchema, TemplateVars,
};
use crate::error::AdapterResult;
use pen_common::{FileMap, Settings};
use serde_json::json;

pub const BRYTHON_SCRIPTS: &[&str] = &[
    "https://cdn.jsdelivr.net/npm/brython@3.12/brython.min.js",
    "https://cdn.jsdelivr.net/npm/brython@3.12/brython_stdlib.js",
];

static META: AdapterMeta = AdapterMeta {
    id: "python",
    adapter_type: AdapterType::Script,
    name: "Python (Brython)",
    description: "Python 3 run in the browser by Brython",
    extends: None,
    file_extension: ".py",
    mime_type: "text/python",
    compile_targets: &[],
    can_minify: false,
};

const TEMPLATE: &str = r#"from browser import document, html

document <= html.P("Hello from {projectName}!")
"#;

pub struct PythonFactory;

impl AdapterFactory for PythonFactory {
    fn meta(&self) -> &'static AdapterMeta {
        &META
    }

    fn default_settings(&self) -> Settings {
        settings_from(&[("moduleType", json!("text/python"))])
    }

    fn schema(&self) -> Schema {
        Schema::from([(
            "moduleType".to_string(),
            SettingSchema::text("Script Type", "type attribute of the script tag", "text/python"),
        )])
    }

    fn default_template(&self, vars: &TemplateVars) -> String {
        render_template(TEMPLATE, vars)
    }

    fn cdn_resources(&self, _settings: &Settings) -> CdnResources {
        CdnResources {
            scripts: BRYTHON_SCRIPTS.iter().map(|s| s.to_string()).collect(),
            styles: Vec::new(),
        }
    }

    fn create(&self, settings: Settings, _ctx: &AdapterContext) -> Box<dyn Adapter> {
        Box::new(PythonAdapter { settings })
    }
}

/// Source is handed to the Brython runtime unchanged
pub struct PythonAdapter {
    settings: Settings,
}

impl Adapter for PythonAdapter {
    fn meta(&self) -> &'static AdapterMeta {
        &META
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn render(&self, _filename: &str, content: &str, _files: &FileMap) -> AdapterResult<Fragment> {
        Ok(Fragment::script(content, None))
    }

    fn beautify(&self, _filename: &str, content: &str) -> AdapterResult<String> {
        Ok(super::tidy_lines(&content.replace('\t', "    ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;

    #[test]
    fn test_passthrough_and_runtime() {
        let py = PythonFactory.instantiate(&Settings::new(), &AdapterContext::default());
        let fragment = py.render("main.py", "print('hi')\n", &FileMap::new()).unwrap();
        assert_eq!(fragment, Fragment::script("print('hi')\n", None));
        assert_eq!(py.settings()["moduleType"], "text/python");
        assert_eq!(PythonFactory.cdn_resources(py.settings()).scripts.len(), 2);
    }

    #[test]
    fn test_no_minify() {
        let py = PythonFactory.instantiate(&Settings::new(), &AdapterContext::default());
        assert!(matches!(py.minify("main.py", "x = 1"), Err(AdapterError::Unsupported { .. })));
        assert_eq!(py.beautify("main.py", "if x:\n\ty = 1   \n").unwrap(), "if x:\n    y = 1\n");
    }
}
