use crate::adapter::{
    render_template, setting_str, settings_from, Adapter, AdapterContext, AdapterFactory, AdapterMeta, AdapterType,
    Fragment, Schema, SettingSchema, TemplateVars,
};
use crate::error::{AdapterResult, CompileError};
use pen_common::{FileMap, Settings};
use regex::Regex;
use serde_json::json;
use std::collections::BTreeMap;

static META: AdapterMeta = AdapterMeta {
    id: "html",
    adapter_type: AdapterType::Markup,
    name: "HTML",
    description: "HyperText Markup Language",
    extends: None,
    file_extension: ".html",
    mime_type: "text/html",
    compile_targets: &[],
    can_minify: true,
};

const TEMPLATE: &str = r#"<div class="container">
  <h1>Welcome to {projectName}</h1>
  <p>Edit the HTML, CSS and JavaScript files to see your changes live.</p>
</div>
"#;

pub struct HtmlFactory;

impl AdapterFactory for HtmlFactory {
    fn meta(&self) -> &'static AdapterMeta {
        &META
    }

    fn default_settings(&self) -> Settings {
        settings_from(&[("doctype", json!("html5")), ("lang", json!("en"))])
    }

    fn schema(&self) -> Schema {
        Schema::from([
            (
                "doctype".to_string(),
                SettingSchema::select("Doctype", "Document type declaration", "html5", &["html5", "xhtml"]),
            ),
            (
                "lang".to_string(),
                SettingSchema::text("Language", "Value of the root lang attribute", "en"),
            ),
        ])
    }

    fn default_template(&self, vars: &TemplateVars) -> String {
        render_template(TEMPLATE, vars)
    }

    fn create(&self, settings: Settings, ctx: &AdapterContext) -> Box<dyn Adapter> {
        Box::new(HtmlAdapter {
            settings,
            ctx: ctx.clone(),
        })
    }
}

/// Compiled once per context
struct Minifier {
    line_breaks: Regex,
    between_tags: Regex,
}

pub struct HtmlAdapter {
    settings: Settings,
    ctx: AdapterContext,
}

impl Adapter for HtmlAdapter {
    fn meta(&self) -> &'static AdapterMeta {
        &META
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn render(&self, _filename: &str, content: &str, _files: &FileMap) -> AdapterResult<Fragment> {
        let mut html_attributes = BTreeMap::new();
        if let Some(lang) = setting_str(&self.settings, "lang").filter(|l| !l.is_empty()) {
            html_attributes.insert("lang".to_string(), lang.to_string());
        }
        Ok(Fragment::Markup {
            body_content: content.to_string(),
            head_content: String::new(),
            html_attributes,
        })
    }

    fn beautify(&self, _filename: &str, content: &str) -> AdapterResult<String> {
        Ok(super::tidy_lines(content))
    }

    fn minify(&self, filename: &str, content: &str) -> AdapterResult<String> {
        let minifier = self
            .ctx
            .cache
            .get_or_try_init("html.minifier", || -> Result<Minifier, regex::Error> {
                Ok(Minifier {
                    line_breaks: Regex::new(r"\n\s*")?,
                    between_tags: Regex::new(r">\s+<")?,
                })
            })
            .map_err(|e| CompileError::new(META.id, filename, e.to_string()))?;

        let collapsed = minifier.line_breaks.replace_all(content, "");
        Ok(minifier.between_tags.replace_all(&collapsed, "><").into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(overrides: Settings) -> Box<dyn Adapter> {
        HtmlFactory.instantiate(&overrides, &AdapterContext::default())
    }

    #[test]
    fn test_render_sets_lang() {
        let html = adapter(settings_from(&[("lang", json!("fr"))]));
        match html.render("index.html", "<p>Salut</p>", &FileMap::new()).unwrap() {
            Fragment::Markup {
                body_content,
                html_attributes,
                ..
            } => {
                assert_eq!(body_content, "<p>Salut</p>");
                assert_eq!(html_attributes.get("lang").map(String::as_str), Some("fr"));
            }
            other => panic!("unexpected fragment {other:?}"),
        }
    }

    #[test]
    fn test_minify() {
        let html = adapter(Settings::new());
        let out = html
            .minify("index.html", "<ul>\n  <li>One</li>\n  <li>Two</li>\n</ul>\n")
            .unwrap();
        assert_eq!(out, "<ul><li>One</li><li>Two</li></ul>");
    }

    #[test]
    fn test_minifier_is_cached() {
        let ctx = AdapterContext::default();
        let html = HtmlFactory.instantiate(&Settings::new(), &ctx);
        html.minify("a.html", "<a> </a>").unwrap();
        assert!(ctx.cache.contains("html.minifier"));
    }

    #[test]
    fn test_template() {
        let mut vars = TemplateVars::new();
        vars.insert("projectName".to_string(), "Demo".to_string());
        assert!(HtmlFactory.default_template(&vars).contains("<h1>Welcome to Demo</h1>"));
    }
}
