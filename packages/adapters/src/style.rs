//! Minifier and pretty-printer for plain CSS

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CssSyntaxError {
    pub message: String,
    pub offset: usize,
}

impl CssSyntaxError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, '{' | '}' | ':' | ';' | ',')
}

/// Length in bytes of the quoted string starting at `src[0]`
fn quoted_len(src: &str) -> Option<usize> {
    let mut chars = src.char_indices();
    let (_, quote) = chars.next()?;
    let mut escaped = false;
    for (i, c) in chars {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            c if c == quote => return Some(i + c.len_utf8()),
            '\n' => return None,
            _ => {}
        }
    }
    None
}

/// Drop comments, collapse whitespace and trim it around separators
pub fn minify_css(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut pending_space = false;
    let mut i = 0;

    while let Some(c) = src[i..].chars().next() {
        if src[i..].starts_with("/*") {
            i = src[i + 2..].find("*/").map_or(src.len(), |end| i + 2 + end + 2);
            pending_space = true;
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            i += c.len_utf8();
            continue;
        }
        if is_separator(c) {
            if c == '}' && out.ends_with(';') {
                out.pop();
            }
            out.push(c);
            pending_space = false;
            i += 1;
            continue;
        }

        if pending_space && !out.is_empty() && !out.ends_with(is_separator) {
            out.push(' ');
        }
        pending_space = false;

        if c == '"' || c == '\'' {
            let len = quoted_len(&src[i..]).unwrap_or(src.len() - i);
            out.push_str(&src[i..i + len]);
            i += len;
        } else {
            out.push(c);
            i += c.len_utf8();
        }
    }

    out
}

struct Printer {
    lines: Vec<String>,
    line: String,
    depth: usize,
}

impl Printer {
    fn indent(&self) -> String {
        "  ".repeat(self.depth)
    }

    fn flush(&mut self) {
        let text = self.line.trim();
        if !text.is_empty() {
            self.lines.push(format!("{}{}", self.indent(), text));
        }
        self.line.clear();
    }

    fn push_space(&mut self) {
        if !self.line.is_empty() && !self.line.ends_with(' ') {
            self.line.push(' ');
        }
    }
}

/// One declaration per line, two-space indentation, a blank line between
/// top-level blocks
pub fn pretty_css(src: &str) -> Result<String, CssSyntaxError> {
    let mut p = Printer {
        lines: Vec::new(),
        line: String::new(),
        depth: 0,
    };
    let mut opens: Vec<usize> = Vec::new();
    let mut parens = 0usize;
    let mut i = 0;

    while let Some(c) = src[i..].chars().next() {
        if src[i..].starts_with("/*") {
            let end = src[i + 2..]
                .find("*/")
                .map(|end| i + 2 + end + 2)
                .ok_or_else(|| CssSyntaxError::new("Unterminated comment", i))?;
            p.flush();
            p.lines.push(format!("{}{}", p.indent(), &src[i..end]));
            i = end;
            continue;
        }

        match c {
            '"' | '\'' => {
                let len = quoted_len(&src[i..])
                    .ok_or_else(|| CssSyntaxError::new("Unterminated string", i))?;
                p.line.push_str(&src[i..i + len]);
                i += len;
                continue;
            }
            '{' => {
                let selector = p.line.trim().to_string();
                p.line = if selector.is_empty() {
                    "{".to_string()
                } else {
                    format!("{selector} {{")
                };
                p.flush();
                p.depth += 1;
                opens.push(i);
            }
            '}' => {
                if opens.pop().is_none() {
                    return Err(CssSyntaxError::new("Unexpected '}'", i));
                }
                p.flush();
                p.depth -= 1;
                p.line.push('}');
                p.flush();
                if p.depth == 0 {
                    p.lines.push(String::new());
                }
            }
            ';' if parens == 0 => {
                p.line.push(';');
                p.flush();
            }
            '(' => {
                parens += 1;
                p.line.push(c);
            }
            ')' => {
                parens = parens.saturating_sub(1);
                p.line.push(c);
            }
            c if c.is_whitespace() => p.push_space(),
            c => p.line.push(c),
        }
        i += c.len_utf8();
    }

    if let Some(open) = opens.pop() {
        return Err(CssSyntaxError::new("Unclosed '{'", open));
    }
    p.flush();
    while p.lines.last().is_some_and(|l| l.is_empty()) {
        p.lines.pop();
    }

    let mut out = p.lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify() {
        let src = "/* theme */\nbody {\n  color : red ;\n  margin: 0 auto;\n}\n\na:hover, a:focus { color: blue; }\n";
        assert_eq!(minify_css(src), "body{color:red;margin:0 auto}a:hover,a:focus{color:blue}");
    }

    #[test]
    fn test_minify_keeps_strings() {
        let src = "a::after { content: \"a  ;  b\"; font-family: 'Open  Sans', serif; }";
        assert_eq!(
            minify_css(src),
            "a::after{content:\"a  ;  b\";font-family:'Open  Sans',serif}"
        );
    }

    #[test]
    fn test_pretty() {
        let out = pretty_css("a{color:red;background:blue}@media (max-width: 600px){b{x:1}}").unwrap();
        assert_eq!(
            out,
            "a {\n  color:red;\n  background:blue\n}\n\n@media (max-width: 600px) {\n  b {\n    x:1\n  }\n}\n"
        );
    }

    #[test]
    fn test_pretty_keeps_data_uri_semicolons() {
        let out = pretty_css("a{background:url(data:image/png;base64,xx)}").unwrap();
        assert!(out.contains("background:url(data:image/png;base64,xx)"));
    }

    #[test]
    fn test_pretty_errors() {
        assert_eq!(pretty_css("a { color: red;").unwrap_err().message, "Unclosed '{'");
        let err = pretty_css("a { }\n}").unwrap_err();
        assert_eq!(err.message, "Unexpected '}'");
        assert_eq!(err.offset, 6);
    }
}
