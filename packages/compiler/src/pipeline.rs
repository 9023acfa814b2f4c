use crate::cdn::CdnTransformer;
use crate::document::{MarkupPatterns, Node, OutputDocument, DEFAULT_TITLE, XHTML_DOCTYPE};
use crate::error::RenderResult;
use pen_adapters::{
    setting_str, Adapter, AdapterContext, AdapterFactory, AdapterRegistry, AdapterType, Fragment,
};
use pen_common::{EditorEntry, FileMap, ProjectConfig, Settings};
use pen_sourcemap::json_to_data_url;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const MARKUP_PATTERNS_KEY: &str = "document.patterns";

pub const DEV_BRIDGE_ID: &str = "pen-debug-bridge";

/// Forwards Chrome DevTools protocol traffic between the preview frame and
/// its embedder
const DEV_BRIDGE: &str = r#"import chobitsu from 'https://esm.sh/chobitsu';
window.chobitsu = chobitsu;
chobitsu.setOnMessage((message) => window.parent.postMessage(message, '*'));
window.addEventListener('message', (event) => {
  if (event.data && event.data.event === 'DEV') {
    try {
      chobitsu.sendRawMessage(event.data.data);
    } catch (e) {
      console.error('pen: devtools bridge rejected a message', e);
    }
  }
});"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Inject the devtools bridge unless the project opts out
    pub dev: bool,
}

/// An editor paired with the dialect that renders it
#[derive(Clone)]
pub struct ResolvedEditor<'a> {
    pub entry: &'a EditorEntry,
    pub factory: Arc<dyn AdapterFactory>,
}

impl ResolvedEditor<'_> {
    pub fn adapter_type(&self) -> AdapterType {
        self.factory.meta().adapter_type
    }
}

/// Sequential renderer: `FileMap` + `ProjectConfig` → one HTML document
#[derive(Clone)]
pub struct Pipeline {
    registry: AdapterRegistry,
    ctx: AdapterContext,
}

impl Pipeline {
    pub fn new(registry: AdapterRegistry, ctx: AdapterContext) -> Self {
        Self { registry, ctx }
    }

    /// Pipeline over every built-in dialect
    pub fn with_defaults() -> Self {
        Self::new(AdapterRegistry::with_defaults(), AdapterContext::default())
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    /// Editors in render order: markup, then style, then script. Editors of
    /// the same class keep their configured order.
    pub fn ordered_editors<'a>(&self, config: &'a ProjectConfig) -> RenderResult<Vec<ResolvedEditor<'a>>> {
        let mut editors = config
            .editors
            .iter()
            .map(|entry| {
                Ok(ResolvedEditor {
                    entry,
                    factory: self.registry.get(&entry.adapter)?,
                })
            })
            .collect::<RenderResult<Vec<_>>>()?;
        editors.sort_by_key(|editor| editor.adapter_type().order());

        for slot in [AdapterType::Markup, AdapterType::Style] {
            let count = editors.iter().filter(|e| e.adapter_type() == slot).count();
            if count > 1 {
                warn!(slot = slot.as_str(), count, "Several editors share one composition slot");
            }
        }
        Ok(editors)
    }

    /// Adapter for `editor` with its settings merged over the dialect
    /// defaults plus the project's import overrides
    pub fn instantiate(&self, editor: &ResolvedEditor<'_>, config: &ProjectConfig) -> Box<dyn Adapter> {
        let settings = editor_settings(editor.entry, config);
        editor.factory.instantiate(&settings, &self.ctx)
    }

    pub fn cdn(&self, config: &ProjectConfig) -> RenderResult<CdnTransformer> {
        Ok(CdnTransformer::cached(&config.import_overrides, &self.ctx.cache)?)
    }

    /// Render the project to a complete HTML document. Any adapter failure
    /// aborts the render; no partial document is produced.
    pub fn render(&self, files: &FileMap, config: &ProjectConfig, options: &RenderOptions) -> RenderResult<String> {
        let html = self.compose(files, config, options)?.serialize();
        info!(bytes = html.len(), "Rendered preview");
        Ok(html)
    }

    #[instrument(skip(self, files, config), fields(project = %config.name, editors = config.editors.len()))]
    pub fn compose(
        &self,
        files: &FileMap,
        config: &ProjectConfig,
        options: &RenderOptions,
    ) -> RenderResult<OutputDocument> {
        let title = if config.name.trim().is_empty() {
            DEFAULT_TITLE
        } else {
            config.name.as_str()
        };
        let mut doc = OutputDocument::new("en", title);
        let cdn = self.cdn(config)?;
        let markup = self
            .ctx
            .cache
            .get_or_try_init(MARKUP_PATTERNS_KEY, MarkupPatterns::compile)?;

        for editor in self.ordered_editors(config)? {
            let filename = editor.entry.filename.as_str();
            let adapter = self.instantiate(&editor, config);
            let content = source_of(files, filename);

            debug!(adapter = %editor.entry.adapter, filename, "Rendering editor");
            let fragment = adapter.render(filename, content, files)?;

            match fragment {
                Fragment::Markup {
                    body_content,
                    head_content,
                    html_attributes,
                } => {
                    inject_markup(&mut doc, &markup, body_content, head_content, html_attributes);
                    if setting_str(adapter.settings(), "doctype") == Some("xhtml") {
                        doc.doctype = XHTML_DOCTYPE.to_string();
                    }
                }
                Fragment::Style { css, map, style_type } => {
                    let css = if style_type == "text/css" {
                        cdn.transform_css_imports(&css)
                    } else {
                        css
                    };
                    let mut body = format!("{css}\n\n/*# sourceURL={filename} */");
                    if let Some(map) = map {
                        body.push_str(&format!("\n/*# sourceMappingURL={} */", json_to_data_url(&map)));
                    }
                    doc.upsert_head(Node::Style {
                        id: format!("pen-style-{}", editor.entry.adapter),
                        style_type,
                        css: body,
                    });
                }
                Fragment::Script { js, map } => {
                    let script_type = script_type(adapter.settings());
                    let mut body = if is_javascript(&script_type) {
                        cdn.transform_js(&js)
                    } else {
                        js
                    };
                    body.push_str(&format!("\n\n//# sourceURL={filename}"));
                    if let Some(map) = map {
                        body.push_str(&format!("\n//# sourceMappingURL={}", json_to_data_url(&map)));
                    }
                    doc.upsert_after_body(Node::inline_script(
                        format!("pen-script-{}", editor.entry.adapter),
                        script_type,
                        body,
                    ));
                }
            }

            let resources = editor.factory.cdn_resources(adapter.settings());
            for href in resources.styles {
                doc.add_resource(Node::Stylesheet { href });
            }
            for src in resources.scripts {
                doc.add_resource(Node::script_src(src));
            }
        }

        for src in &config.global_resources.scripts {
            doc.add_resource(Node::script_src(src.as_str()));
        }
        for href in &config.global_resources.styles {
            doc.add_resource(Node::Stylesheet { href: href.clone() });
        }

        if inject_dev_tools(config, options) {
            doc.prepend_head(Node::inline_script(DEV_BRIDGE_ID, "module", DEV_BRIDGE));
        }

        Ok(doc)
    }
}

/// Editor settings with the project's `importOverrides` folded in
pub fn editor_settings(entry: &EditorEntry, config: &ProjectConfig) -> Settings {
    let overrides = config
        .import_overrides
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect::<Settings>();
    let mut settings = entry.settings.clone();
    settings.insert("importOverrides".to_string(), serde_json::Value::Object(overrides));
    settings
}

/// `<script type>` for a script editor's `moduleType` setting
pub fn script_type(settings: &Settings) -> String {
    match setting_str(settings, "moduleType") {
        None | Some("") | Some("module") => "module".to_string(),
        Some("classic") => "text/javascript".to_string(),
        Some(other) => other.to_string(),
    }
}

pub fn is_javascript(script_type: &str) -> bool {
    matches!(script_type, "module" | "text/javascript")
}

pub(crate) fn source_of<'a>(files: &'a FileMap, filename: &str) -> &'a str {
    match files.get(filename) {
        Some(content) => content,
        None => {
            debug!(filename, "Editor file missing from file map, rendering empty source");
            ""
        }
    }
}

fn inject_dev_tools(config: &ProjectConfig, options: &RenderOptions) -> bool {
    let opted_out = config
        .preview
        .as_ref()
        .and_then(|preview| preview.inject_dev_tools)
        == Some(false);
    options.dev && !opted_out
}

fn inject_markup(
    doc: &mut OutputDocument,
    patterns: &MarkupPatterns,
    mut body: String,
    mut head: String,
    mut html_attributes: BTreeMap<String, String>,
) {
    if patterns.is_full_document(&body) {
        let page = patterns.split(&body);
        body = page.body;
        if !page.head.is_empty() {
            if !head.is_empty() {
                head.push('\n');
            }
            head.push_str(&page.head);
        }
        html_attributes.extend(page.html_attributes);
        doc.body_attributes.extend(page.body_attributes);
    }

    if !body.is_empty() {
        doc.body = body;
    }
    doc.append_head_html(&head);
    doc.html_attributes.extend(html_attributes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pen_common::PreviewOptions;
    use serde_json::json;

    #[test]
    fn test_script_type_mapping() {
        let settings = |v: serde_json::Value| serde_json::from_value::<Settings>(v).unwrap();
        assert_eq!(script_type(&Settings::new()), "module");
        assert_eq!(script_type(&settings(json!({"moduleType": "classic"}))), "text/javascript");
        assert_eq!(script_type(&settings(json!({"moduleType": "text/python"}))), "text/python");
        assert!(!is_javascript("text/python"));
    }

    #[test]
    fn test_editor_settings_carry_import_overrides() {
        let mut config = ProjectConfig::default_named("demo");
        config.import_overrides.insert("vue".into(), "https://x/vue.js".into());
        let entry = EditorEntry::new("javascript", "main.js");

        let settings = editor_settings(&entry, &config);
        assert_eq!(settings["importOverrides"]["vue"], "https://x/vue.js");
    }

    #[test]
    fn test_dev_tools_opt_out() {
        let mut config = ProjectConfig::default_named("demo");
        let dev = RenderOptions { dev: true };
        assert!(inject_dev_tools(&config, &dev));
        assert!(!inject_dev_tools(&config, &RenderOptions::default()));

        config.preview = Some(PreviewOptions {
            inject_dev_tools: Some(false),
        });
        assert!(!inject_dev_tools(&config, &dev));
    }
}
