use crate::adapter::{
    render_template, setting_bool, settings_from, Adapter, AdapterContext, AdapterFactory, AdapterMeta, AdapterType,
    CdnResources, Fragment, Schema, SettingSchema, TemplateVars,
};
use crate::error::AdapterResult;
use crate::style::{minify_css, pretty_css};
use pen_common::{FileMap, Settings};
use serde_json::json;

pub const NORMALIZE_URL: &str = "https://cdn.jsdelivr.net/npm/normalize.css@8.0.1/normalize.min.css";

static META: AdapterMeta = AdapterMeta {
    id: "css",
    adapter_type: AdapterType::Style,
    name: "CSS",
    description: "Cascading Style Sheets",
    extends: None,
    file_extension: ".css",
    mime_type: "text/css",
    compile_targets: &[],
    can_minify: true,
};

const TEMPLATE: &str = r#"body {
  font-family: system-ui, -apple-system, sans-serif;
  margin: 0;
  padding: 2rem;
}

.container {
  max-width: 720px;
  margin: 0 auto;
}
"#;

pub struct CssFactory;

impl AdapterFactory for CssFactory {
    fn meta(&self) -> &'static AdapterMeta {
        &META
    }

    fn default_settings(&self) -> Settings {
        settings_from(&[("normalize", json!(true))])
    }

    fn schema(&self) -> Schema {
        Schema::from([(
            "normalize".to_string(),
            SettingSchema::boolean("Normalize", "Include normalize.css before the styles", true),
        )])
    }

    fn default_template(&self, vars: &TemplateVars) -> String {
        render_template(TEMPLATE, vars)
    }

    fn cdn_resources(&self, settings: &Settings) -> CdnResources {
        let mut resources = CdnResources::default();
        if setting_bool(settings, "normalize") {
            resources.styles.push(NORMALIZE_URL.to_string());
        }
        resources
    }

    fn create(&self, settings: Settings, _ctx: &AdapterContext) -> Box<dyn Adapter> {
        Box::new(CssAdapter { settings })
    }
}

/// Plain CSS; also the base behavior the preprocessor dialects delegate to
pub struct CssAdapter {
    settings: Settings,
}

impl CssAdapter {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

impl Adapter for CssAdapter {
    fn meta(&self) -> &'static AdapterMeta {
        &META
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn render(&self, _filename: &str, content: &str, _files: &FileMap) -> AdapterResult<Fragment> {
        Ok(Fragment::css(content))
    }

    fn beautify(&self, filename: &str, content: &str) -> AdapterResult<String> {
        pretty_css(content).map_err(|e| super::format_error(&META, filename, content, e.message, e.offset))
    }

    fn minify(&self, _filename: &str, content: &str) -> AdapterResult<String> {
        Ok(minify_css(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;

    #[test]
    fn test_normalize_resource() {
        let on = CssFactory.default_settings();
        assert_eq!(CssFactory.cdn_resources(&on).styles, vec![NORMALIZE_URL.to_string()]);

        let off = settings_from(&[("normalize", json!(false))]);
        assert!(CssFactory.cdn_resources(&off).styles.is_empty());
    }

    #[test]
    fn test_render_is_verbatim() {
        let css = CssFactory.instantiate(&Settings::new(), &AdapterContext::default());
        let fragment = css.render("style.css", "a { color: red }", &FileMap::new()).unwrap();
        assert_eq!(fragment, Fragment::css("a { color: red }"));
    }

    #[test]
    fn test_beautify_reports_position() {
        let css = CssFactory.instantiate(&Settings::new(), &AdapterContext::default());
        let err = css.beautify("style.css", "a {\n  color: red;\n").unwrap_err();
        assert!(matches!(err, AdapterError::Format(_)));
        assert_eq!(err.position(), (Some(1), Some(3)));
    }
}
