//! Output document model used by the compositor
//!
//! The document is a fixed shell (doctype, `html`, `head`, `body`) plus
//! ordered head nodes and trailing script nodes. Nodes carrying an id are
//! upserted, so re-rendering the same editor replaces its node in place.

use regex::Regex;
use std::collections::BTreeMap;

pub const DEFAULT_TITLE: &str = "Pen Preview";
pub const HTML5_DOCTYPE: &str = "<!DOCTYPE html>";
pub const XHTML_DOCTYPE: &str = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Style {
        id: String,
        style_type: String,
        css: String,
    },
    Script {
        id: Option<String>,
        script_type: Option<String>,
        src: Option<String>,
        content: String,
    },
    Stylesheet {
        href: String,
    },
    /// Markup copied from a markup fragment's head
    Raw(String),
}

impl Node {
    pub fn script_src(src: impl Into<String>) -> Self {
        Node::Script {
            id: None,
            script_type: None,
            src: Some(src.into()),
            content: String::new(),
        }
    }

    pub fn inline_script(id: impl Into<String>, script_type: impl Into<String>, content: impl Into<String>) -> Self {
        Node::Script {
            id: Some(id.into()),
            script_type: Some(script_type.into()),
            src: None,
            content: content.into(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Node::Style { id, .. } => Some(id),
            Node::Script { id, .. } => id.as_deref(),
            _ => None,
        }
    }

    /// URL of an external resource node
    fn resource_url(&self) -> Option<&str> {
        match self {
            Node::Script { src, .. } => src.as_deref(),
            Node::Stylesheet { href } => Some(href),
            _ => None,
        }
    }

    fn write(&self, out: &mut String) {
        match self {
            Node::Style { id, style_type, css } => {
                out.push_str(&format!(
                    "<style id=\"{}\" type=\"{}\">{}</style>",
                    escape_attr(id),
                    escape_attr(style_type),
                    escape_raw_text(css, "style")
                ));
            }
            Node::Script {
                id,
                script_type,
                src,
                content,
            } => {
                out.push_str("<script");
                for (name, value) in [("id", id), ("type", script_type), ("src", src)] {
                    if let Some(value) = value {
                        out.push_str(&format!(" {name}=\"{}\"", escape_attr(value)));
                    }
                }
                out.push('>');
                out.push_str(&escape_raw_text(content, "script"));
                out.push_str("</script>");
            }
            Node::Stylesheet { href } => {
                out.push_str(&format!("<link rel=\"stylesheet\" href=\"{}\">", escape_attr(href)));
            }
            Node::Raw(html) => out.push_str(html.trim()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDocument {
    pub doctype: String,
    pub title: String,
    pub html_attributes: BTreeMap<String, String>,
    pub body_attributes: BTreeMap<String, String>,
    pub body: String,
    head: Vec<Node>,
    after_body: Vec<Node>,
}

impl OutputDocument {
    /// Empty shell with `lang` and `<title>`
    pub fn new(lang: &str, title: &str) -> Self {
        let mut html_attributes = BTreeMap::new();
        html_attributes.insert("lang".to_string(), lang.to_string());
        Self {
            doctype: HTML5_DOCTYPE.to_string(),
            title: title.to_string(),
            html_attributes,
            body_attributes: BTreeMap::new(),
            body: String::new(),
            head: Vec::new(),
            after_body: Vec::new(),
        }
    }

    pub fn head(&self) -> &[Node] {
        &self.head
    }

    pub fn after_body(&self) -> &[Node] {
        &self.after_body
    }

    pub fn append_head_html(&mut self, html: &str) {
        if !html.trim().is_empty() {
            self.head.push(Node::Raw(html.to_string()));
        }
    }

    pub fn upsert_head(&mut self, node: Node) {
        upsert(&mut self.head, node, false);
    }

    pub fn prepend_head(&mut self, node: Node) {
        upsert(&mut self.head, node, true);
    }

    pub fn upsert_after_body(&mut self, node: Node) {
        upsert(&mut self.after_body, node, false);
    }

    /// Add an external stylesheet or script to the head unless a node with
    /// the same URL is already there. Returns whether it was added.
    pub fn add_resource(&mut self, node: Node) -> bool {
        let Some(url) = node.resource_url() else {
            return false;
        };
        if self.head.iter().any(|n| n.resource_url() == Some(url)) {
            return false;
        }
        self.head.push(node);
        true
    }

    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(256 + self.body.len());
        out.push_str(&self.doctype);
        out.push('\n');
        out.push_str(&open_tag("html", &self.html_attributes));
        out.push_str("\n<head>\n");
        out.push_str("<meta charset=\"UTF-8\">\n");
        out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");

        let custom_title = self
            .head
            .iter()
            .any(|n| matches!(n, Node::Raw(html) if html.to_ascii_lowercase().contains("<title")));
        if !custom_title {
            out.push_str(&format!("<title>{}</title>\n", escape_text(&self.title)));
        }

        for node in &self.head {
            node.write(&mut out);
            out.push('\n');
        }
        out.push_str("</head>\n");
        out.push_str(&open_tag("body", &self.body_attributes));
        out.push('\n');
        if !self.body.is_empty() {
            out.push_str(self.body.trim_end());
            out.push('\n');
        }
        out.push_str("</body>\n");
        for node in &self.after_body {
            node.write(&mut out);
            out.push('\n');
        }
        out.push_str("</html>\n");
        out
    }
}

fn upsert(nodes: &mut Vec<Node>, node: Node, prepend: bool) {
    if let Some(id) = node.id() {
        if let Some(existing) = nodes.iter_mut().find(|n| n.id() == Some(id)) {
            *existing = node;
            return;
        }
    }
    if prepend {
        nodes.insert(0, node);
    } else {
        nodes.push(node);
    }
}

fn open_tag(name: &str, attributes: &BTreeMap<String, String>) -> String {
    let mut tag = format!("<{name}");
    for (key, value) in attributes {
        tag.push_str(&format!(" {key}=\"{}\"", escape_attr(value)));
    }
    tag.push('>');
    tag
}

pub fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

pub fn escape_text(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Keep embedded code from closing its own element early
fn escape_raw_text(content: &str, tag: &str) -> String {
    let needle = format!("</{tag}");
    let lower = content.to_ascii_lowercase();
    if !lower.contains(&needle) {
        return content.to_string();
    }
    let mut out = String::with_capacity(content.len() + 8);
    let mut last = 0;
    for (at, _) in lower.match_indices(&needle) {
        out.push_str(&content[last..at]);
        out.push_str("<\\/");
        last = at + 2;
    }
    out.push_str(&content[last..]);
    out
}

/// Regexes for pulling apart markup that is itself a whole page
pub struct MarkupPatterns {
    full_document: Regex,
    html_tag: Regex,
    head: Regex,
    body: Regex,
    after_head: Regex,
    attribute: Regex,
}

impl MarkupPatterns {
    pub fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            full_document: Regex::new(r"(?i)<html|<!doctype")?,
            html_tag: Regex::new(r"(?is)<html\b([^>]*)>")?,
            head: Regex::new(r"(?is)<head\b[^>]*>(.*?)</head\s*>")?,
            body: Regex::new(r"(?is)<body\b([^>]*)>(.*?)(?:</body\s*>|\z)")?,
            after_head: Regex::new(r"(?is)</head\s*>(.*?)(?:</html\s*>|\z)")?,
            attribute: Regex::new(r#"([^\s=/>"']+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+)))?"#)?,
        })
    }

    /// Whether markup carries its own doctype or `<html>` element
    pub fn is_full_document(&self, markup: &str) -> bool {
        self.full_document.is_match(markup)
    }

    pub fn split(&self, markup: &str) -> FullDocument {
        let html_attributes = self
            .html_tag
            .captures(markup)
            .map(|caps| self.attributes(&caps[1]))
            .unwrap_or_default();

        let head = self
            .head
            .captures(markup)
            .map(|caps| caps[1].trim().to_string())
            .unwrap_or_default();

        let (body_attributes, body) = match self.body.captures(markup) {
            Some(caps) => (self.attributes(&caps[1]), caps[2].trim().to_string()),
            None => {
                let rest = self
                    .after_head
                    .captures(markup)
                    .map(|caps| caps[1].trim().to_string())
                    .unwrap_or_default();
                (BTreeMap::new(), rest)
            }
        };

        FullDocument {
            html_attributes,
            body_attributes,
            head,
            body,
        }
    }

    fn attributes(&self, source: &str) -> BTreeMap<String, String> {
        self.attribute
            .captures_iter(source)
            .map(|caps| {
                let value = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .or_else(|| caps.get(4))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                (caps[1].to_ascii_lowercase(), value)
            })
            .collect()
    }
}

/// Parts of a page-shaped markup fragment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullDocument {
    pub html_attributes: BTreeMap<String, String>,
    pub body_attributes: BTreeMap<String, String>,
    pub head: String,
    pub body: String,
}
