use super::lexer::{tokenize, LexError, Token, TokenKind};

/// Token-level minifier: drops comments and collapses whitespace
///
/// A line break is kept wherever automatic semicolon insertion could depend
/// on it.
pub fn minify_js(src: &str) -> Result<String, LexError> {
    let tokens = tokenize(src)?;
    let mut out = String::with_capacity(src.len() / 2);
    let mut prev: Option<Token<'_>> = None;
    let mut saw_newline = false;

    for token in tokens {
        match token.kind {
            TokenKind::Whitespace | TokenKind::LineComment => continue,
            TokenKind::Newline => {
                saw_newline = true;
                continue;
            }
            TokenKind::BlockComment => {
                saw_newline |= token.text.contains('\n');
                continue;
            }
            _ => {}
        }

        if let Some(prev) = prev {
            if saw_newline && newline_matters(&prev, &token) {
                out.push('\n');
            } else if needs_space(&prev, &token) {
                out.push(' ');
            }
        }
        out.push_str(token.text);
        prev = Some(token);
        saw_newline = false;
    }

    Ok(out)
}

fn newline_matters(prev: &Token<'_>, next: &Token<'_>) -> bool {
    if prev.kind == TokenKind::Punct && !matches!(prev.text, ")" | "]" | "}" | "++" | "--") {
        return false;
    }
    if next.kind == TokenKind::Punct
        && !matches!(next.text, "(" | "[" | "{" | "+" | "-" | "++" | "--" | "!" | "~" | "..." | "@" | "<")
    {
        return false;
    }
    true
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '#' || !c.is_ascii()
}

fn needs_space(prev: &Token<'_>, next: &Token<'_>) -> bool {
    let (Some(last), Some(first)) = (prev.text.chars().last(), next.text.chars().next()) else {
        return false;
    };

    if prev.kind == TokenKind::Regex && is_word_char(first) {
        return true;
    }
    if is_word_char(last) && is_word_char(first) {
        return true;
    }
    if prev.kind == TokenKind::Number && first == '.' {
        return true;
    }
    matches!((last, first), ('+', '+') | ('-', '-') | ('/', '/') | ('<', '!'))
}
