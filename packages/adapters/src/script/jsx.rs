//! JSX to `createElement`-style calls
//!
//! Ordinary script is copied token by token. Wherever an expression may
//! start and a `<` opens a tag, the element is parsed by hand and emitted as
//! `pragma(tag, props, ...children)`. Line breaks inside elements are kept
//! between call arguments so line numbers after an element stay put.

use super::lexer::{LexError, Token, TokenKind, Tokenizer, KEYWORDS_BEFORE_EXPRESSION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsxOptions {
    /// Element factory, e.g. `React.createElement`
    pub pragma: String,
    /// Fragment component, e.g. `React.Fragment`
    pub fragment: String,
}

impl JsxOptions {
    pub fn react() -> Self {
        Self {
            pragma: "React.createElement".to_string(),
            fragment: "React.Fragment".to_string(),
        }
    }

    pub fn preact() -> Self {
        Self {
            pragma: "h".to_string(),
            fragment: "Fragment".to_string(),
        }
    }
}

pub fn transform_jsx(src: &str, options: &JsxOptions) -> Result<String, LexError> {
    let mut transform = Transform::new(src, options);
    transform.script(0, false)?;
    Ok(transform.out)
}

enum Prop {
    Pair(String, String),
    Spread(String),
}

struct Transform<'a, 'o> {
    src: &'a str,
    options: &'o JsxOptions,
    out: String,
}

impl<'a, 'o> Transform<'a, 'o> {
    fn new(src: &'a str, options: &'o JsxOptions) -> Self {
        Self {
            src,
            options,
            out: String::with_capacity(src.len()),
        }
    }

    /// Copy script from `from`; with `in_braces`, stop at the unmatched `}`
    /// and return its offset
    fn script(&mut self, from: usize, in_braces: bool) -> Result<usize, LexError> {
        let mut tokenizer = Tokenizer::at(self.src, from);
        let mut prev: Option<Token<'a>> = None;
        let mut depth = 0usize;

        loop {
            let Some(token) = tokenizer.next() else {
                if in_braces {
                    return Err(LexError::new("Unexpected end of input in JSX expression", self.src.len()));
                }
                return Ok(self.src.len());
            };
            let token = token?;

            if in_braces && token.kind == TokenKind::Punct {
                if token.is("{") {
                    depth += 1;
                } else if token.is("}") {
                    if depth == 0 {
                        return Ok(token.start);
                    }
                    depth -= 1;
                }
            }

            if token.is("<") && jsx_allowed(prev.as_ref()) && self.opens_element(token.start) {
                let (element, end) = self.element(token.start)?;
                self.out.push_str(&element);
                let closer = Token {
                    kind: TokenKind::Punct,
                    text: ")",
                    start: end,
                };
                tokenizer = Tokenizer::at(self.src, end);
                tokenizer.set_prev(Some(closer));
                prev = Some(closer);
                continue;
            }

            self.out.push_str(token.text);
            if !token.is_trivia() {
                prev = Some(token);
            }
        }
    }

    fn opens_element(&self, lt: usize) -> bool {
        let rest = &self.src[lt + 1..];
        let Some(first) = rest.chars().next() else {
            return false;
        };
        if first == '>' {
            return true;
        }
        if !(first.is_alphabetic() || first == '_' || first == '$') {
            return false;
        }
        let after_name = rest.trim_start_matches(is_name_char).trim_start();
        matches!(after_name.chars().next(), Some('>' | '/' | '{') | Some('a'..='z' | 'A'..='Z' | '_' | '$'))
    }

    fn byte(&self, at: usize) -> Option<u8> {
        self.src.as_bytes().get(at).copied()
    }

    fn skip_space(&self, mut at: usize, newlines: &mut usize) -> usize {
        while let Some(b) = self.byte(at) {
            match b {
                b'\n' => *newlines += 1,
                b' ' | b'\t' | b'\r' => {}
                _ => break,
            }
            at += 1;
        }
        at
    }

    fn name(&self, at: usize) -> (&'a str, usize) {
        let rest = &self.src[at..];
        let len = rest.len() - rest.trim_start_matches(is_name_char).len();
        (&rest[..len], at + len)
    }

    /// Transformed text of the `{ ... }` expression whose body starts at `from`
    fn expression(&self, from: usize) -> Result<(String, usize), LexError> {
        let mut inner = Transform::new(self.src, self.options);
        let close = inner.script(from, true)?;
        Ok((inner.out, close + 1))
    }

    /// Parse the element opening at `lt`; returns the emitted call and the end offset
    fn element(&self, lt: usize) -> Result<(String, usize), LexError> {
        let mut pending = 0usize;
        let mut at = self.skip_space(lt + 1, &mut pending);

        let (tag, after_tag) = self.name(at);
        at = after_tag;
        let fragment = tag.is_empty();

        let mut props = Vec::new();
        let mut self_closing = false;
        loop {
            at = self.skip_space(at, &mut pending);
            match self.byte(at) {
                Some(b'/') if self.byte(at + 1) == Some(b'>') => {
                    self_closing = true;
                    at += 2;
                    break;
                }
                Some(b'>') => {
                    at += 1;
                    break;
                }
                Some(b'{') => {
                    let mut inner_at = self.skip_space(at + 1, &mut pending);
                    if !self.src[inner_at..].starts_with("...") {
                        return Err(LexError::new("Expected '...' in JSX spread attribute", at));
                    }
                    inner_at += 3;
                    let (expr, end) = self.expression(inner_at)?;
                    props.push(Prop::Spread(expr.trim().to_string()));
                    at = end;
                }
                Some(_) if !fragment => {
                    let (attr, after) = self.name(at);
                    if attr.is_empty() {
                        return Err(LexError::new("Unexpected character in JSX attribute", at));
                    }
                    at = self.skip_space(after, &mut pending);
                    let value = if self.byte(at) == Some(b'=') {
                        at = self.skip_space(at + 1, &mut pending);
                        let (value, end) = self.attribute_value(at)?;
                        at = end;
                        value
                    } else {
                        "true".to_string()
                    };
                    props.push(Prop::Pair(attr.to_string(), value));
                }
                _ => return Err(LexError::new("Unterminated JSX tag", lt)),
            }
        }

        let mut args: Vec<String> = Vec::new();
        if !self_closing {
            at = self.children(lt, tag, at, &mut args, &mut pending)?;
        }

        let tag_expr = if fragment {
            self.options.fragment.clone()
        } else if is_intrinsic(tag) {
            quote(tag)
        } else {
            tag.to_string()
        };

        let mut call = format!("{}({}, {}", self.options.pragma, tag_expr, props_object(&props));
        for arg in args {
            call.push_str(", ");
            call.push_str(&arg);
        }
        call.push(')');
        call.push_str(&"\n".repeat(pending));
        Ok((call, at))
    }

    fn attribute_value(&self, at: usize) -> Result<(String, usize), LexError> {
        match self.byte(at) {
            Some(q @ (b'"' | b'\'')) => {
                let body_start = at + 1;
                let len = self.src[body_start..]
                    .bytes()
                    .position(|b| b == q)
                    .ok_or_else(|| LexError::new("Unterminated JSX attribute string", at))?;
                let raw = &self.src[body_start..body_start + len];
                Ok((quote(&decode_entities(raw)), body_start + len + 1))
            }
            Some(b'{') => {
                let (expr, end) = self.expression(at + 1)?;
                Ok((expr.trim().to_string(), end))
            }
            Some(b'<') => self.element(at),
            _ => Err(LexError::new("Expected JSX attribute value", at)),
        }
    }

    fn children(
        &self,
        lt: usize,
        tag: &str,
        mut at: usize,
        args: &mut Vec<String>,
        pending: &mut usize,
    ) -> Result<usize, LexError> {
        loop {
            match self.byte(at) {
                None => return Err(LexError::new("Unterminated JSX contents", lt)),
                Some(b'<') if self.byte(at + 1) == Some(b'/') => {
                    let mut close_at = self.skip_space(at + 2, pending);
                    let (closing, after) = self.name(close_at);
                    if closing != tag {
                        let shown = if tag.is_empty() { "" } else { tag };
                        return Err(LexError::new(
                            format!("Expected corresponding JSX closing tag for <{shown}>"),
                            at,
                        ));
                    }
                    close_at = self.skip_space(after, pending);
                    if self.byte(close_at) != Some(b'>') {
                        return Err(LexError::new("Unterminated JSX closing tag", at));
                    }
                    return Ok(close_at + 1);
                }
                Some(b'<') => {
                    let (child, end) = self.element(at)?;
                    args.push(with_newlines(pending, child));
                    at = end;
                }
                Some(b'{') => {
                    let (expr, end) = self.expression(at + 1)?;
                    let trimmed = expr.trim();
                    *pending += expr.matches('\n').count();
                    if !is_empty_expression(trimmed) {
                        args.push(with_newlines(pending, trimmed.to_string()));
                    }
                    at = end;
                }
                Some(_) => {
                    let rest = &self.src[at..];
                    let len = rest.find(&['{', '<'][..]).unwrap_or(rest.len());
                    let raw = &rest[..len];
                    if let Some(text) = jsx_text(raw) {
                        args.push(with_newlines(pending, quote(&decode_entities(&text))));
                    }
                    *pending += raw.matches('\n').count();
                    at += len;
                }
            }
        }
    }
}

fn jsx_allowed(prev: Option<&Token<'_>>) -> bool {
    match prev {
        None => true,
        Some(tok) => match tok.kind {
            TokenKind::Punct => !matches!(tok.text, ")" | "]" | "}"),
            TokenKind::Ident => KEYWORDS_BEFORE_EXPRESSION.contains(&tok.text),
            _ => false,
        },
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '-' | '.' | ':')
}

/// Lowercase and namespaced tags are host elements
fn is_intrinsic(tag: &str) -> bool {
    tag.starts_with(|c: char| c.is_ascii_lowercase()) && !tag.contains('.') || tag.contains('-') || tag.contains(':')
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

fn props_object(props: &[Prop]) -> String {
    if props.is_empty() {
        return "null".to_string();
    }
    let entries: Vec<String> = props
        .iter()
        .map(|prop| match prop {
            Prop::Pair(key, value) if is_identifier(key) => format!("{key}: {value}"),
            Prop::Pair(key, value) => format!("{}: {value}", quote(key)),
            Prop::Spread(expr) => format!("...{expr}"),
        })
        .collect();
    format!("{{ {} }}", entries.join(", "))
}

fn with_newlines(pending: &mut usize, arg: String) -> String {
    let prefix = "\n".repeat(std::mem::take(pending));
    format!("{prefix}{arg}")
}

/// `{}` and `{/* comment */}` produce no child
fn is_empty_expression(expr: &str) -> bool {
    let mut rest = expr.trim();
    while let Some(after) = rest.strip_prefix("/*") {
        match after.find("*/") {
            Some(end) => rest = after[end + 2..].trim_start(),
            None => return false,
        }
    }
    rest.is_empty()
}

/// Apply JSX whitespace rules: lines are trimmed, blank lines dropped and
/// the rest joined by single spaces
fn jsx_text(raw: &str) -> Option<String> {
    if !raw.contains('\n') {
        return (!raw.is_empty()).then(|| raw.to_string());
    }
    let lines: Vec<&str> = raw.split('\n').collect();
    let last = lines.len() - 1;
    let kept: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let line = if idx == 0 { line.trim_end() } else if idx == last { line.trim_start() } else { line.trim() };
            line.trim_matches('\r')
        })
        .filter(|line| !line.is_empty())
        .collect();
    (!kept.is_empty()).then(|| kept.join(" "))
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn react(src: &str) -> String {
        transform_jsx(src, &JsxOptions::react()).unwrap()
    }

    #[test]
    fn test_simple_element() {
        assert_eq!(
            react("const el = <h1 className=\"title\">Hello</h1>;"),
            "const el = React.createElement(\"h1\", { className: \"title\" }, \"Hello\");"
        );
    }

    #[test]
    fn test_components_expressions_and_spread() {
        let out = react("render(<App {...props} count={n + 1} data-id='x' disabled />)");
        assert_eq!(
            out,
            "render(React.createElement(App, { ...props, count: n + 1, \"data-id\": \"x\", disabled: true }))"
        );
    }

    #[test]
    fn test_nested_children_keep_lines() {
        let src = "const ui = (\n  <div>\n    <p>{name}</p>\n  </div>\n);\nfoo();";
        let out = react(src);
        assert_eq!(out.lines().count(), src.lines().count());
        assert!(out.contains("React.createElement(\"div\", null, \n"));
        assert!(out.contains("React.createElement(\"p\", null, name)"));
        assert!(out.ends_with(");\nfoo();"));
    }

    #[test]
    fn test_fragment_and_preact() {
        let out = transform_jsx("x = <><b>a</b></>", &JsxOptions::preact()).unwrap();
        assert_eq!(out, "x = h(Fragment, null, h(\"b\", null, \"a\"))");
    }

    #[test]
    fn test_jsx_inside_expression_container() {
        let out = react("<ul>{items.map(i => <li key={i}>{i}</li>)}</ul>");
        assert_eq!(
            out,
            "React.createElement(\"ul\", null, items.map(i => React.createElement(\"li\", { key: i }, i)))"
        );
    }

    #[test]
    fn test_text_whitespace_and_entities() {
        let out = react("<p>\n  Hello &amp; welcome,\n  friend\n</p>");
        assert!(out.contains("\"Hello & welcome, friend\""), "{out}");
    }

    #[test]
    fn test_comparisons_are_not_jsx() {
        let src = "if (a < b && c > d) { return x<y; }";
        assert_eq!(react(src), src);
    }

    #[test]
    fn test_comment_child_dropped() {
        assert_eq!(react("<div>{/* note */}</div>"), "React.createElement(\"div\", null)");
    }

    #[test]
    fn test_mismatched_closing_tag() {
        let err = transform_jsx("<div><span></div>", &JsxOptions::react()).unwrap_err();
        assert_eq!(err.message, "Expected corresponding JSX closing tag for <span>");
        assert_eq!(err.offset, 11);
    }

    #[test]
    fn test_member_tag_is_component() {
        assert_eq!(
            react("<motion.div />"),
            "React.createElement(motion.div, null)"
        );
    }
}
