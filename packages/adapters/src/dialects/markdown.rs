use crate::adapter::{
    render_template, setting_bool, settings_from, Adapter, AdapterContext, AdapterFactory, AdapterMeta, AdapterType,
    Fragment, Schema, SettingSchema, TemplateVars,
};
use crate::error::AdapterResult;
use pen_common::{FileMap, Settings};
use pulldown_cmark::{html, Options, Parser};
use serde_json::json;

static META: AdapterMeta = AdapterMeta {
    id: "markdown",
    adapter_type: AdapterType::Markup,
    name: "Markdown",
    description: "CommonMark rendered to HTML",
    extends: None,
    file_extension: ".md",
    mime_type: "text/markdown",
    compile_targets: &["html"],
    can_minify: false,
};

const TEMPLATE: &str = "# {projectName}\n\nWrite **Markdown** here and watch the preview update.\n\n- [x] Edit\n- [ ] Publish\n";

pub struct MarkdownFactory;

impl AdapterFactory for MarkdownFactory {
    fn meta(&self) -> &'static AdapterMeta {
        &META
    }

    fn default_settings(&self) -> Settings {
        settings_from(&[("gfm", json!(true))])
    }

    fn schema(&self) -> Schema {
        Schema::from([(
            "gfm".to_string(),
            SettingSchema::boolean("GitHub extensions", "Tables, strikethrough and task lists", true),
        )])
    }

    fn default_template(&self, vars: &TemplateVars) -> String {
        render_template(TEMPLATE, vars)
    }

    fn create(&self, settings: Settings, _ctx: &AdapterContext) -> Box<dyn Adapter> {
        Box::new(MarkdownAdapter { settings })
    }
}

pub struct MarkdownAdapter {
    settings: Settings,
}

impl MarkdownAdapter {
    fn to_html(&self, content: &str) -> String {
        let mut options = Options::empty();
        if setting_bool(&self.settings, "gfm") {
            options.insert(Options::ENABLE_TABLES);
            options.insert(Options::ENABLE_STRIKETHROUGH);
            options.insert(Options::ENABLE_TASKLISTS);
        }
        let mut out = String::with_capacity(content.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(content, options));
        out
    }
}

impl Adapter for MarkdownAdapter {
    fn meta(&self) -> &'static AdapterMeta {
        &META
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn render(&self, _filename: &str, content: &str, _files: &FileMap) -> AdapterResult<Fragment> {
        Ok(Fragment::markup(self.to_html(content)))
    }

    fn beautify(&self, _filename: &str, content: &str) -> AdapterResult<String> {
        Ok(super::tidy_lines(content))
    }

    fn compile_to(&self, filename: &str, target: &str, content: &str) -> AdapterResult<crate::Compiled> {
        if target != "html" {
            return Err(crate::AdapterError::unsupported(META.id, format!("compile to {target}")));
        }
        tracing::debug!(filename, "Compiling markdown to html");
        Ok(crate::Compiled {
            code: self.to_html(content),
            map: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_commonmark() {
        let md = MarkdownFactory.instantiate(&Settings::new(), &AdapterContext::default());
        let fragment = md.render("README.md", "# Title\n\nSome *text*.", &FileMap::new()).unwrap();
        assert_eq!(
            fragment,
            Fragment::markup("<h1>Title</h1>\n<p>Some <em>text</em>.</p>\n")
        );
    }

    #[test]
    fn test_tables_follow_setting() {
        let src = "| a | b |\n|---|---|\n| 1 | 2 |\n";
        let ctx = AdapterContext::default();

        let gfm = MarkdownFactory.instantiate(&Settings::new(), &ctx);
        assert!(gfm.compile_to("t.md", "html", src).unwrap().code.contains("<table>"));

        let plain = MarkdownFactory.instantiate(&settings_from(&[("gfm", json!(false))]), &ctx);
        assert!(!plain.compile_to("t.md", "html", src).unwrap().code.contains("<table>"));
    }
}
