use crate::adapter::{
    render_template, setting_bool, setting_str, settings_from, Adapter, AdapterContext, AdapterFactory, AdapterMeta,
    AdapterType, Fragment, Schema, SettingSchema, TemplateVars,
};
use crate::error::AdapterResult;
use crate::script::{check_balanced, format_js, minify_js, tokenize, LexError};
use pen_common::{FileMap, Settings};
use serde_json::json;

static META: AdapterMeta = AdapterMeta {
    id: "javascript",
    adapter_type: AdapterType::Script,
    name: "JavaScript",
    description: "Modern JavaScript, run as an ES module by default",
    extends: None,
    file_extension: ".js",
    mime_type: "text/javascript",
    compile_targets: &[],
    can_minify: true,
};

const TEMPLATE: &str = r#"const heading = document.querySelector('h1');

heading?.addEventListener('click', () => {
  console.log('Hello from {projectName}!');
});
"#;

pub struct JavaScriptFactory;

impl JavaScriptFactory {
    pub(crate) fn base_schema() -> Schema {
        Schema::from([
            (
                "moduleType".to_string(),
                SettingSchema::select(
                    "Script Type",
                    "Run as an ES module or a classic script",
                    "module",
                    &["module", "classic"],
                ),
            ),
            (
                "strictMode".to_string(),
                SettingSchema::boolean("Strict Mode", "Add \"use strict\" to classic scripts", true),
            ),
        ])
    }
}

impl AdapterFactory for JavaScriptFactory {
    fn meta(&self) -> &'static AdapterMeta {
        &META
    }

    fn default_settings(&self) -> Settings {
        settings_from(&[("moduleType", json!("module")), ("strictMode", json!(true))])
    }

    fn schema(&self) -> Schema {
        Self::base_schema()
    }

    fn default_template(&self, vars: &TemplateVars) -> String {
        render_template(TEMPLATE, vars)
    }

    fn create(&self, settings: Settings, _ctx: &AdapterContext) -> Box<dyn Adapter> {
        Box::new(JavaScriptAdapter { settings })
    }
}

/// Script base behavior; the typed and JSX dialects delegate to it
pub struct JavaScriptAdapter {
    settings: Settings,
}

impl JavaScriptAdapter {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Reject sources that would fail to parse in the browser
    pub fn validate(&self, content: &str) -> Result<(), LexError> {
        check_balanced(&tokenize(content)?)
    }

    /// Source as it should run, with the strict-mode prologue for classic scripts
    pub fn finish(&self, js: &str) -> String {
        let classic = setting_str(&self.settings, "moduleType") == Some("classic");
        let has_prologue = js.trim_start().starts_with("\"use strict\"") || js.trim_start().starts_with("'use strict'");
        if classic && setting_bool(&self.settings, "strictMode") && !has_prologue {
            // same line, so line numbers are unchanged
            format!("\"use strict\";{js}")
        } else {
            js.to_string()
        }
    }
}

impl Adapter for JavaScriptAdapter {
    fn meta(&self) -> &'static AdapterMeta {
        &META
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn render(&self, filename: &str, content: &str, _files: &FileMap) -> AdapterResult<Fragment> {
        self.validate(content)
            .map_err(|e| super::compile_error(&META, filename, content, e))?;
        Ok(Fragment::script(self.finish(content), None))
    }

    fn beautify(&self, filename: &str, content: &str) -> AdapterResult<String> {
        format_js(content).map_err(|e| super::format_error(&META, filename, content, e.message, e.offset))
    }

    fn minify(&self, filename: &str, content: &str) -> AdapterResult<String> {
        minify_js(content).map_err(|e| super::compile_error(&META, filename, content, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;

    fn js(overrides: Settings) -> Box<dyn Adapter> {
        JavaScriptFactory.instantiate(&overrides, &AdapterContext::default())
    }

    #[test]
    fn test_render_passes_source_through() {
        let src = "import confetti from 'canvas-confetti';\nconfetti();\n";
        let fragment = js(Settings::new()).render("script.js", src, &FileMap::new()).unwrap();
        assert_eq!(fragment, Fragment::script(src, None));
    }

    #[test]
    fn test_classic_scripts_get_strict_prologue() {
        let adapter = js(settings_from(&[("moduleType", json!("classic"))]));
        let fragment = adapter.render("script.js", "x = 1;", &FileMap::new()).unwrap();
        assert_eq!(fragment, Fragment::script("\"use strict\";x = 1;", None));
    }

    #[test]
    fn test_syntax_error_position() {
        let err = js(Settings::new())
            .render("script.js", "function f() {\n  return 'oops;\n}\n", &FileMap::new())
            .unwrap_err();
        match err {
            AdapterError::Compile(e) => {
                assert_eq!(e.message, "Unterminated string literal");
                assert_eq!((e.line, e.column), (Some(2), Some(10)));
                assert_eq!(e.title, "Compilation Error");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_minify_and_beautify() {
        let adapter = js(Settings::new());
        assert_eq!(adapter.minify("a.js", "let  a = 1 ;\n").unwrap(), "let a=1;");
        assert_eq!(adapter.beautify("a.js", "if (a) {\nb()\n}").unwrap(), "if (a) {\n  b()\n}\n");
        assert!(matches!(adapter.beautify("a.js", "if (a) {"), Err(AdapterError::Format(_))));
    }
}
