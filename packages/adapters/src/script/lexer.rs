//! ECMAScript tokenizer shared by the script dialects
//!
//! Logos handles the regular part of the grammar. Template literals and
//! regular expression literals depend on context, so the driver scans them
//! by hand and bumps the logos lexer past them.

use logos::Logos;
use thiserror::Error;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum Raw {
    #[regex(r"[ \t\r\x0B\x0C]+")]
    Whitespace,

    #[token("\n")]
    Newline,

    #[regex(r"//[^\n]*")]
    LineComment,

    #[regex(r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/")]
    BlockComment,

    #[regex(r"#?[A-Za-z_$\x{80}-\x{10FFFF}][A-Za-z0-9_$\x{80}-\x{10FFFF}]*")]
    Ident,

    #[regex(r"[0-9][0-9_]*(\.[0-9_]*)?([eE][+-]?[0-9_]+)?n?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9_]+)?")]
    #[regex(r"0[xXoObB][0-9a-fA-F_]+n?")]
    Number,

    #[regex(r#""([^"\\\n]|\\(.|\n))*""#)]
    #[regex(r#"'([^'\\\n]|\\(.|\n))*'"#)]
    String,

    #[token("`")]
    Backtick,

    #[token("/")]
    #[token("/=")]
    Slash,

    // `>` is always a single token so that nested generics close cleanly
    #[regex(r"=>|\.\.\.|\?\?=?|\?\.|===?|!==?|<=|<<=?|&&=?|\|\|=?|\*\*=?|\+\+|--|[-+*%&|^]=|[{}()\[\];,<>+\-*%&|^!~?:=.@]")]
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    Newline,
    LineComment,
    BlockComment,
    Ident,
    Number,
    String,
    Template,
    Regex,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset into the tokenized source
    pub start: usize,
}

impl<'a> Token<'a> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::Newline | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    pub fn is(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == punct
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == word
    }

    /// Whether an expression can end with this token
    pub fn ends_expression(&self) -> bool {
        match self.kind {
            TokenKind::Ident => !KEYWORDS_BEFORE_EXPRESSION.contains(&self.text),
            TokenKind::Number | TokenKind::String | TokenKind::Template | TokenKind::Regex => true,
            TokenKind::Punct => matches!(self.text, ")" | "]" | "}"),
            _ => false,
        }
    }

    pub fn newlines(&self) -> usize {
        self.text.bytes().filter(|b| *b == b'\n').count()
    }
}

/// Keywords after which an expression (and so a regex or JSX) may start
pub const KEYWORDS_BEFORE_EXPRESSION: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await", "default", "extends",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub offset: usize,
}

impl LexError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

pub struct Tokenizer<'a> {
    src: &'a str,
    base: usize,
    lexer: logos::Lexer<'a, Raw>,
    prev: Option<Token<'a>>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self::at(src, 0)
    }

    /// Start tokenizing `src` at byte `offset` (must be a char boundary)
    pub fn at(src: &'a str, offset: usize) -> Self {
        Self {
            src,
            base: offset,
            lexer: Raw::lexer(&src[offset..]),
            prev: None,
        }
    }

    /// Override the last significant token, which decides how `/` is read
    pub fn set_prev(&mut self, prev: Option<Token<'a>>) {
        self.prev = prev;
    }

    fn lex_error(&self, start: usize) -> LexError {
        match self.src[start..].chars().next() {
            Some('"') | Some('\'') => LexError::new("Unterminated string literal", start),
            Some(c) => LexError::new(format!("Unexpected character '{c}'"), start),
            None => LexError::new("Unexpected end of input", start),
        }
    }

    fn bump_to(&mut self, end: usize) {
        let current = self.base + self.lexer.span().end;
        if end > current {
            self.lexer.bump(end - current);
        }
    }

    fn next_token(&mut self) -> Option<Result<Token<'a>, LexError>> {
        let raw = self.lexer.next()?;
        let start = self.base + self.lexer.span().start;

        let kind = match raw {
            Err(()) => return Some(Err(self.lex_error(start))),
            Ok(Raw::Whitespace) => TokenKind::Whitespace,
            Ok(Raw::Newline) => TokenKind::Newline,
            Ok(Raw::LineComment) => TokenKind::LineComment,
            Ok(Raw::BlockComment) => TokenKind::BlockComment,
            Ok(Raw::Ident) => TokenKind::Ident,
            Ok(Raw::Number) => TokenKind::Number,
            Ok(Raw::String) => TokenKind::String,
            Ok(Raw::Punct) => TokenKind::Punct,
            Ok(Raw::Backtick) => match scan_template(self.src, start) {
                Ok(end) => {
                    self.bump_to(end);
                    TokenKind::Template
                }
                Err(e) => return Some(Err(e)),
            },
            Ok(Raw::Slash) => {
                if self.src[start..].starts_with("/*") {
                    return Some(Err(LexError::new("Unterminated comment", start)));
                }
                if regex_allowed(self.prev.as_ref()) {
                    match scan_regex(self.src, start) {
                        Ok(end) => {
                            self.bump_to(end);
                            TokenKind::Regex
                        }
                        Err(e) => return Some(Err(e)),
                    }
                } else {
                    TokenKind::Punct
                }
            }
        };

        let end = self.base + self.lexer.span().end;
        let token = Token {
            kind,
            text: &self.src[start..end],
            start,
        };
        if !token.is_trivia() {
            self.prev = Some(token);
        }
        Some(Ok(token))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

fn regex_allowed(prev: Option<&Token<'_>>) -> bool {
    match prev {
        None => true,
        Some(tok) => match tok.kind {
            TokenKind::Punct => !matches!(tok.text, ")" | "]" | "}"),
            TokenKind::Ident => KEYWORDS_BEFORE_EXPRESSION.contains(&tok.text),
            _ => false,
        },
    }
}

/// End offset of the template literal whose backtick is at `start`
fn scan_template(src: &str, start: usize) -> Result<usize, LexError> {
    let bytes = src.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Ok(i + 1),
            b'$' if bytes.get(i + 1) == Some(&b'{') => i = scan_braced(src, i + 2)?,
            _ => i += 1,
        }
    }
    Err(LexError::new("Unterminated template literal", start))
}

/// End offset of a `${ ... }` substitution whose body starts at `from`
fn scan_braced(src: &str, from: usize) -> Result<usize, LexError> {
    let mut depth = 0usize;
    for token in Tokenizer::at(src, from) {
        let token = token?;
        if token.is("{") {
            depth += 1;
        } else if token.is("}") {
            if depth == 0 {
                return Ok(token.end());
            }
            depth -= 1;
        }
    }
    Err(LexError::new("Unterminated template expression", from.saturating_sub(2)))
}

/// End offset of the regex literal whose slash is at `start`, flags included
fn scan_regex(src: &str, start: usize) -> Result<usize, LexError> {
    let bytes = src.as_bytes();
    let mut i = start + 1;
    let mut in_class = false;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'\\' => i += 2,
            b'\n' => break,
            b'[' => {
                in_class = true;
                i += 1;
            }
            b']' => {
                in_class = false;
                i += 1;
            }
            b'/' if !in_class => {
                i += 1;
                while bytes.get(i).is_some_and(|c| c.is_ascii_alphanumeric()) {
                    i += 1;
                }
                return Ok(i);
            }
            _ => i += 1,
        }
    }
    Err(LexError::new("Unterminated regular expression", start))
}

pub fn tokenize(src: &str) -> Result<Vec<Token<'_>>, LexError> {
    Tokenizer::new(src).collect()
}

/// Check that `()`, `[]` and `{}` nest properly
pub fn check_balanced(tokens: &[Token<'_>]) -> Result<(), LexError> {
    let mut stack: Vec<&Token<'_>> = Vec::new();
    for token in tokens.iter().filter(|t| t.kind == TokenKind::Punct) {
        match token.text {
            "(" | "[" | "{" => stack.push(token),
            ")" | "]" | "}" => {
                let expected = match stack.pop().map(|open| open.text) {
                    Some("(") => ")",
                    Some("[") => "]",
                    Some("{") => "}",
                    _ => return Err(LexError::new(format!("Unexpected token '{}'", token.text), token.start)),
                };
                if token.text != expected {
                    return Err(LexError::new(
                        format!("Unexpected token '{}', expected '{expected}'", token.text),
                        token.start,
                    ));
                }
            }
            _ => {}
        }
    }
    match stack.pop() {
        Some(open) => Err(LexError::new(format!("Unclosed '{}'", open.text), open.start)),
        None => Ok(()),
    }
}

/// Tokens without whitespace and comments
pub fn significant<'t, 'a>(tokens: &'t [Token<'a>]) -> impl Iterator<Item = &'t Token<'a>> {
    tokens.iter().filter(|t| !t.is_trivia())
}
