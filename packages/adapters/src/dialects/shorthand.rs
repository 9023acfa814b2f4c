//! Indentation-based markup: `pug` and `slim`
//!
//! Both share one line grammar. The first word is a tag, `.name` and
//! `#name` add classes and an id, `(a="b" c)` adds attributes, and the rest
//! of the line is text. Nesting follows indentation. `| text` is a text line,
//! lines starting with `<` pass through as HTML and `doctype html` emits the
//! doctype. Pug additionally supports `//` comments, `//-` silent comments,
//! `tag.` text blocks and `tag: child` inline nesting. Slim takes bare
//! `name="value"` attributes after the tag, `/!` comments and `/` silent
//! comments.

use crate::adapter::{
    render_template, setting_bool, settings_from, Adapter, AdapterContext, AdapterFactory, AdapterMeta, AdapterType,
    Compiled, Fragment, Schema, SettingSchema, TemplateVars,
};
use crate::error::{AdapterError, AdapterResult, CompileError};
use pen_common::{FileMap, Settings};
use serde_json::json;

static PUG_META: AdapterMeta = AdapterMeta {
    id: "pug",
    adapter_type: AdapterType::Markup,
    name: "Pug",
    description: "Pug template engine (formerly Jade)",
    extends: None,
    file_extension: ".pug",
    mime_type: "text/x-pug",
    compile_targets: &["html"],
    can_minify: false,
};

static SLIM_META: AdapterMeta = AdapterMeta {
    id: "slim",
    adapter_type: AdapterType::Markup,
    name: "Slim",
    description: "Slim template language",
    extends: None,
    file_extension: ".slim",
    mime_type: "text/x-slim",
    compile_targets: &["html"],
    can_minify: false,
};

const TEMPLATE: &str = ".container\n  h1 Welcome to {projectName}\n  p Start editing to see your changes live!\n";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Pug,
    Slim,
}

pub struct ShorthandFactory {
    syntax: Syntax,
}

impl ShorthandFactory {
    pub fn pug() -> Self {
        Self { syntax: Syntax::Pug }
    }

    pub fn slim() -> Self {
        Self { syntax: Syntax::Slim }
    }
}

fn meta_for(syntax: Syntax) -> &'static AdapterMeta {
    match syntax {
        Syntax::Pug => &PUG_META,
        Syntax::Slim => &SLIM_META,
    }
}

impl AdapterFactory for ShorthandFactory {
    fn meta(&self) -> &'static AdapterMeta {
        meta_for(self.syntax)
    }

    fn default_settings(&self) -> Settings {
        match self.syntax {
            Syntax::Pug => settings_from(&[("pretty", json!(true))]),
            Syntax::Slim => Settings::new(),
        }
    }

    fn schema(&self) -> Schema {
        match self.syntax {
            Syntax::Pug => Schema::from([(
                "pretty".to_string(),
                SettingSchema::boolean("Pretty Print", "Output formatted HTML with indentation", true),
            )]),
            Syntax::Slim => Schema::new(),
        }
    }

    fn default_template(&self, vars: &TemplateVars) -> String {
        render_template(TEMPLATE, vars)
    }

    fn create(&self, settings: Settings, _ctx: &AdapterContext) -> Box<dyn Adapter> {
        Box::new(ShorthandAdapter {
            syntax: self.syntax,
            settings,
        })
    }
}

pub struct ShorthandAdapter {
    syntax: Syntax,
    settings: Settings,
}

impl ShorthandAdapter {
    fn pretty(&self) -> bool {
        match self.syntax {
            Syntax::Pug => setting_bool(&self.settings, "pretty"),
            Syntax::Slim => true,
        }
    }

    fn to_html(&self, filename: &str, content: &str) -> Result<String, CompileError> {
        let nodes = parse(content, self.syntax).map_err(|e| {
            CompileError::new(self.meta().id, filename, e.message).at(e.line, e.column)
        })?;
        let mut out = String::new();
        write_nodes(&nodes, 0, self.pretty(), &mut out);
        Ok(out)
    }
}

impl Adapter for ShorthandAdapter {
    fn meta(&self) -> &'static AdapterMeta {
        meta_for(self.syntax)
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn render(&self, filename: &str, content: &str, _files: &FileMap) -> AdapterResult<Fragment> {
        Ok(Fragment::markup(self.to_html(filename, content)?))
    }

    fn beautify(&self, _filename: &str, content: &str) -> AdapterResult<String> {
        Ok(super::tidy_lines(content))
    }

    fn compile_to(&self, filename: &str, target: &str, content: &str) -> AdapterResult<Compiled> {
        if target != "html" {
            return Err(AdapterError::unsupported(self.meta().id, format!("compile to {target}")));
        }
        Ok(Compiled {
            code: self.to_html(filename, content)?,
            map: None,
        })
    }
}

/// Opening text, closing text and nested nodes of one output line
#[derive(Debug, Default, PartialEq, Eq)]
struct Node {
    open: String,
    close: String,
    children: Vec<Node>,
}

impl Node {
    fn text(text: impl Into<String>) -> Self {
        Self {
            open: text.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ParseError {
    message: String,
    line: u32,
    column: u32,
}

/// Failure inside one line, at a byte offset into that line
struct LineError {
    message: String,
    offset: usize,
}

impl LineError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

fn parse(src: &str, syntax: Syntax) -> Result<Vec<Node>, ParseError> {
    let mut roots: Vec<Node> = Vec::new();
    let mut stack: Vec<(usize, Node)> = Vec::new();
    // lines indented deeper than this are swallowed by a silent comment
    let mut silent_below: Option<usize> = None;
    // lines indented deeper than this are text of a `tag.` block
    let mut text_below: Option<usize> = None;

    for (index, raw) in src.lines().enumerate() {
        let content = raw.trim();
        if content.is_empty() {
            continue;
        }
        let indent = raw.len() - raw.trim_start().len();

        if silent_below.is_some_and(|level| indent > level) {
            continue;
        }
        silent_below = None;

        if let Some(level) = text_below {
            if indent > level {
                if let Some((_, parent)) = stack.last_mut() {
                    parent.children.push(Node::text(content));
                }
                continue;
            }
            text_below = None;
        }

        while stack.last().is_some_and(|(level, _)| *level >= indent) {
            if let Some((_, node)) = stack.pop() {
                attach(&mut stack, &mut roots, node);
            }
        }

        let line = parse_line(content, syntax).map_err(|e| ParseError {
            message: e.message,
            line: u32::try_from(index + 1).unwrap_or(u32::MAX),
            column: u32::try_from(indent + e.offset + 1).unwrap_or(u32::MAX),
        })?;
        match line {
            Line::Silent => silent_below = Some(indent),
            Line::Node { node, text_block } => {
                if text_block {
                    text_below = Some(indent);
                }
                stack.push((indent, node));
            }
        }
    }

    while let Some((_, node)) = stack.pop() {
        attach(&mut stack, &mut roots, node);
    }
    Ok(roots)
}

fn attach(stack: &mut [(usize, Node)], roots: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some((_, parent)) => parent.children.push(node),
        None => roots.push(node),
    }
}

enum Line {
    /// Comment that is not rendered, along with its nested lines
    Silent,
    Node { node: Node, text_block: bool },
}

fn parse_line(content: &str, syntax: Syntax) -> Result<Line, LineError> {
    let node = |node: Node| Ok(Line::Node { node, text_block: false });

    if let Some(text) = content.strip_prefix('|') {
        return node(Node::text(text.strip_prefix(' ').unwrap_or(text)));
    }
    if content.starts_with('<') {
        return node(Node::text(content));
    }
    if let Some(kind) = content.strip_prefix("doctype") {
        if kind.is_empty() || kind.starts_with(' ') {
            return node(Node::text(doctype(kind.trim())));
        }
    }

    match syntax {
        Syntax::Pug => {
            if content.starts_with("//-") {
                return Ok(Line::Silent);
            }
            if let Some(text) = content.strip_prefix("//") {
                return node(comment(text));
            }
        }
        Syntax::Slim => {
            if let Some(text) = content.strip_prefix("/!") {
                return node(comment(text));
            }
            if content.starts_with('/') {
                return Ok(Line::Silent);
            }
        }
    }

    if content.starts_with('-') || content.starts_with('=') {
        return Err(LineError::new("Embedded code is not supported", 0));
    }

    let (node, text_block) = parse_element(content, 0, syntax)?;
    Ok(Line::Node { node, text_block })
}

fn doctype(kind: &str) -> String {
    match kind {
        "" | "html" | "5" => "<!DOCTYPE html>".to_string(),
        "xml" => r#"<?xml version="1.0" encoding="utf-8" ?>"#.to_string(),
        other => format!("<!DOCTYPE {other}>"),
    }
}

fn comment(text: &str) -> Node {
    Node {
        open: format!("<!-- {}", text.trim()),
        close: " -->".to_string(),
        children: Vec::new(),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Length of the leading run of characters accepted by `accept`
fn take_while(s: &str, accept: impl Fn(char) -> bool) -> usize {
    s.find(|c: char| !accept(c)).unwrap_or(s.len())
}

/// Parse `tag.class#id(attrs) text` starting at byte `base` of the line
fn parse_element(content: &str, base: usize, syntax: Syntax) -> Result<(Node, bool), LineError> {
    let tag_len = take_while(content, |c| is_name_char(c) || c == ':');
    let mut tag = &content[..tag_len];
    // `li: a` nests, `a:b` is a namespaced tag
    if let Some(stripped) = tag.strip_suffix(':') {
        tag = stripped;
    }
    let mut rest = &content[tag.len()..];

    if tag.is_empty() && !(rest.starts_with('.') || rest.starts_with('#')) {
        let unexpected = rest.chars().next().unwrap_or(' ');
        return Err(LineError::new(format!("Unexpected character '{unexpected}'"), base));
    }
    let tag = if tag.is_empty() { "div" } else { tag };

    let mut classes: Vec<&str> = Vec::new();
    let mut id: Option<&str> = None;
    let mut attrs: Vec<(String, Option<String>)> = Vec::new();

    loop {
        let offset = base + content.len() - rest.len();
        if let Some(after) = rest.strip_prefix('.') {
            let len = take_while(after, is_name_char);
            if len == 0 {
                break;
            }
            classes.push(&after[..len]);
            rest = &after[len..];
        } else if let Some(after) = rest.strip_prefix('#') {
            let len = take_while(after, is_name_char);
            if len == 0 {
                return Err(LineError::new("Expected an id after '#'", offset));
            }
            id = Some(&after[..len]);
            rest = &after[len..];
        } else if let Some(after) = rest.strip_prefix('(') {
            let (parsed, consumed) = parse_attributes(after, offset + 1)?;
            attrs.extend(parsed);
            rest = &after[consumed..];
        } else {
            break;
        }
    }

    if syntax == Syntax::Slim {
        let (parsed, remaining) = parse_bare_attributes(rest, base + content.len() - rest.len())?;
        attrs.extend(parsed);
        rest = remaining;
    }

    let mut node = Node {
        open: open_tag(tag, id, &classes, &attrs),
        close: if VOID_ELEMENTS.contains(&tag) {
            String::new()
        } else {
            format!("</{tag}>")
        },
        children: Vec::new(),
    };

    let offset = base + content.len() - rest.len();
    if rest.is_empty() {
        return Ok((node, false));
    }
    if syntax == Syntax::Pug && rest == "." {
        return Ok((node, true));
    }
    if syntax == Syntax::Pug {
        if let Some(child) = rest.strip_prefix(": ") {
            let trimmed = child.trim_start();
            let child_base = offset + rest.len() - trimmed.len();
            let (child, text_block) = parse_element(trimmed, child_base, syntax)?;
            node.children.push(child);
            return Ok((node, text_block));
        }
    }
    match rest.strip_prefix(' ') {
        Some(text) => {
            node.open.push_str(text.trim_start());
            Ok((node, false))
        }
        None => {
            let unexpected = rest.chars().next().unwrap_or(' ');
            Err(LineError::new(format!("Unexpected character '{unexpected}'"), offset))
        }
    }
}

fn open_tag(tag: &str, id: Option<&str>, classes: &[&str], attrs: &[(String, Option<String>)]) -> String {
    let mut class_list: Vec<&str> = classes.to_vec();
    for (name, value) in attrs {
        if name == "class" {
            if let Some(value) = value {
                class_list.push(value);
            }
        }
    }

    let mut out = format!("<{tag}");
    if let Some(id) = id {
        out.push_str(&format!(" id=\"{id}\""));
    }
    if !class_list.is_empty() {
        out.push_str(&format!(" class=\"{}\"", class_list.join(" ")));
    }
    for (name, value) in attrs.iter().filter(|(name, _)| name != "class") {
        match value {
            Some(value) => out.push_str(&format!(" {name}=\"{}\"", value.replace('"', "&quot;"))),
            None => out.push_str(&format!(" {name}")),
        }
    }
    out.push('>');
    out
}

/// Attributes inside `( ... )`, returning them with the bytes consumed
/// including the closing paren
fn parse_attributes(src: &str, base: usize) -> Result<(Vec<(String, Option<String>)>, usize), LineError> {
    let mut attrs = Vec::new();
    let mut pos = 0;
    loop {
        pos += take_while(&src[pos..], |c| c.is_whitespace() || c == ',');
        let rest = &src[pos..];
        if rest.is_empty() {
            return Err(LineError::new("Unterminated attribute list", base.saturating_sub(1)));
        }
        if rest.starts_with(')') {
            return Ok((attrs, pos + 1));
        }

        let name_len = take_while(rest, |c| !c.is_whitespace() && !matches!(c, '=' | ',' | ')' | '"' | '\''));
        if name_len == 0 {
            return Err(LineError::new("Expected an attribute name", base + pos));
        }
        let name = rest[..name_len].to_string();
        pos += name_len;

        if let Some(after) = src[pos..].strip_prefix('=') {
            pos += 1;
            let (value, consumed) = attribute_value(after, base + pos, |c| c.is_whitespace() || c == ',' || c == ')')?;
            attrs.push((name, Some(value)));
            pos += consumed;
        } else {
            attrs.push((name, None));
        }
    }
}

/// Slim's `name="value"` pairs between the tag and its text
fn parse_bare_attributes(src: &str, base: usize) -> Result<(Vec<(String, Option<String>)>, &str), LineError> {
    let mut attrs = Vec::new();
    let mut rest = src;
    loop {
        let Some(after_space) = rest.strip_prefix(' ') else {
            return Ok((attrs, rest));
        };
        let candidate = after_space.trim_start();
        let name_len = take_while(candidate, |c| is_name_char(c) || c == ':' || c == '@');
        if name_len == 0 || !candidate[name_len..].starts_with('=') {
            return Ok((attrs, rest));
        }

        let value_start = src.len() - candidate.len() + name_len + 1;
        let (value, consumed) = attribute_value(&candidate[name_len + 1..], base + value_start, char::is_whitespace)?;
        attrs.push((candidate[..name_len].to_string(), Some(value)));
        rest = &candidate[name_len + 1 + consumed..];
    }
}

/// A quoted or bare value, returning it with the bytes consumed
fn attribute_value(src: &str, base: usize, ends_bare: impl Fn(char) -> bool) -> Result<(String, usize), LineError> {
    match src.chars().next() {
        Some(quote @ ('"' | '\'')) => match src[1..].find(quote) {
            Some(end) => Ok((src[1..end + 1].to_string(), end + 2)),
            None => Err(LineError::new("Unterminated attribute value", base)),
        },
        _ => {
            let len = take_while(src, |c| !ends_bare(c));
            if len == 0 {
                return Err(LineError::new("Expected an attribute value", base));
            }
            Ok((src[..len].to_string(), len))
        }
    }
}

fn write_nodes(nodes: &[Node], depth: usize, pretty: bool, out: &mut String) {
    for node in nodes {
        let indent = if pretty { "  ".repeat(depth) } else { String::new() };
        let newline = if pretty { "\n" } else { "" };
        if node.children.is_empty() {
            out.push_str(&format!("{indent}{}{}{newline}", node.open, node.close));
        } else {
            out.push_str(&format!("{indent}{}{newline}", node.open));
            write_nodes(&node.children, depth + 1, pretty, out);
            out.push_str(&format!("{indent}{}{newline}", node.close));
        }
    }
}
