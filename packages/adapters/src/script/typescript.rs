//! Type erasure for TypeScript
//!
//! Works on the token stream: type-only syntax is masked out and replaced by
//! the line breaks it contained, so the output has the same line count as
//! the input and maps 1:1 by line. Enums are the only construct that emits
//! new runtime code.

use super::lexer::{check_balanced, tokenize, LexError, Token, TokenKind};
use std::collections::HashMap;

const PARAM_MODIFIERS: &[&str] = &["public", "private", "protected", "readonly", "override"];
const MEMBER_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "readonly", "override", "declare", "abstract",
];
const DECLARE_TARGETS: &[&str] = &[
    "const", "let", "var", "function", "class", "enum", "namespace", "module", "global",
    "abstract", "interface", "type", "async",
];
const ANGLE_REJECT: &[&str] = &[
    "&&", "||", "==", "===", "!=", "!==", "+", "*", "/", "%", "!", "<=", "++", "--", "+=", "-=",
    "*=", "/=", "%=", "**", "??", "&&=", "||=", "??=", "<<", "<<=", "@",
];

#[derive(Debug, Clone, PartialEq)]
enum Frame {
    Block,
    Object,
    Paren,
    Bracket,
    ImportExport,
    ClassBody {
        open: usize,
        in_initializer: bool,
        member_start: usize,
    },
    Params {
        in_default: bool,
        ctor: bool,
        props: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy)]
struct Declaration {
    depth: usize,
    expect_annotation: bool,
}

/// Erase TypeScript-only syntax, keeping line structure
pub fn strip_types(src: &str) -> Result<String, LexError> {
    let tokens = tokenize(src)?;
    check_balanced(&tokens)?;
    let mut stripper = Stripper::new(tokens);
    stripper.run()?;
    Ok(stripper.render())
}

struct Stripper<'a> {
    toks: Vec<Token<'a>>,
    sig: Vec<usize>,
    masked: Vec<bool>,
    replace: HashMap<usize, String>,
    insert_after: HashMap<usize, String>,
    stack: Vec<Frame>,
    decl: Option<Declaration>,
    clause: bool,
    pending_class_body: Option<usize>,
    fn_start: Option<usize>,
}

impl<'a> Stripper<'a> {
    fn new(toks: Vec<Token<'a>>) -> Self {
        let sig = toks
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_trivia())
            .map(|(k, _)| k)
            .collect();
        let masked = vec![false; toks.len()];
        Self {
            toks,
            sig,
            masked,
            replace: HashMap::new(),
            insert_after: HashMap::new(),
            stack: Vec::new(),
            decl: None,
            clause: false,
            pending_class_body: None,
            fn_start: None,
        }
    }

    // ---- token access -------------------------------------------------

    fn tok(&self, i: usize) -> Option<&Token<'a>> {
        self.sig.get(i).map(|&k| &self.toks[k])
    }

    fn is(&self, i: usize, punct: &str) -> bool {
        self.tok(i).is_some_and(|t| t.is(punct))
    }

    fn word(&self, i: usize, word: &str) -> bool {
        self.tok(i).is_some_and(|t| t.is_word(word))
    }

    fn kind(&self, i: usize) -> Option<TokenKind> {
        self.tok(i).map(|t| t.kind)
    }

    fn is_masked(&self, i: usize) -> bool {
        self.sig.get(i).is_some_and(|&k| self.masked[k])
    }

    fn mask(&mut self, from: usize, to: usize) {
        if from >= to || from >= self.sig.len() {
            return;
        }
        let first = self.sig[from];
        let last = self.sig[(to - 1).min(self.sig.len() - 1)];
        for k in first..=last {
            self.masked[k] = true;
        }
    }

    fn newline_before(&self, i: usize) -> bool {
        let (Some(&k), true) = (self.sig.get(i), i > 0) else {
            return false;
        };
        let prev = self.sig[i - 1];
        self.toks[prev + 1..k]
            .iter()
            .any(|t| t.kind == TokenKind::Newline || (t.kind == TokenKind::BlockComment && t.text.contains('\n')))
    }

    fn prev_unmasked(&self, i: usize) -> Option<usize> {
        (0..i).rev().find(|&p| !self.is_masked(p))
    }

    fn next_unmasked(&self, i: usize) -> usize {
        let mut j = i;
        while j < self.sig.len() && self.is_masked(j) {
            j += 1;
        }
        j
    }

    fn top(&self) -> Option<&Frame> {
        self.stack.last()
    }

    /// Closing bracket index for the opener at `i`
    fn matching(&self, i: usize) -> usize {
        let mut depth = 0usize;
        for j in i..self.sig.len() {
            let t = &self.toks[self.sig[j]];
            if t.kind != TokenKind::Punct {
                continue;
            }
            match t.text {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => {
                    depth -= 1;
                    if depth == 0 {
                        return j;
                    }
                }
                _ => {}
            }
        }
        self.sig.len().saturating_sub(1)
    }

    /// Closing `>` for a `<` that opens a type argument/parameter list
    fn match_angle(&self, i: usize) -> Option<usize> {
        let mut angle = 0i32;
        let mut other = 0i32;
        for j in i..self.sig.len().min(i + 256) {
            let t = self.tok(j)?;
            match t.kind {
                TokenKind::Regex => return None,
                TokenKind::Ident if matches!(t.text, "return" | "if" | "while" | "for" | "throw") => {
                    return None
                }
                TokenKind::Punct => match t.text {
                    "<" => angle += 1,
                    ">" => {
                        angle -= 1;
                        if angle == 0 {
                            return (other == 0).then_some(j);
                        }
                    }
                    "(" | "[" | "{" => other += 1,
                    ")" | "]" | "}" => {
                        other -= 1;
                        if other < 0 {
                            return None;
                        }
                    }
                    ";" if other == 0 => return None,
                    p if ANGLE_REJECT.contains(&p) => return None,
                    _ => {}
                },
                _ => {}
            }
        }
        None
    }

    // ---- types --------------------------------------------------------

    /// Index just past the type starting at `i`
    fn skip_type(&self, mut i: usize) -> usize {
        if self.is(i, "|") || self.is(i, "&") {
            i += 1;
        }
        i = self.skip_type_operand(i);
        loop {
            if self.is(i, "|") || self.is(i, "&") {
                i = self.skip_type_operand(i + 1);
                continue;
            }
            if self.word(i, "extends") {
                let check = self.skip_type_operand(i + 1);
                if self.is(check, "?") {
                    let yes = self.skip_type(check + 1);
                    if self.is(yes, ":") {
                        i = self.skip_type(yes + 1);
                        continue;
                    }
                }
            }
            return i;
        }
    }

    fn skip_type_operand(&self, mut i: usize) -> usize {
        while let Some(t) = self.tok(i) {
            let prefix = t.kind == TokenKind::Ident
                && matches!(t.text, "keyof" | "typeof" | "readonly" | "unique" | "infer" | "asserts")
                && matches!(self.kind(i + 1), Some(TokenKind::Ident));
            if prefix {
                i += 1;
            } else {
                break;
            }
        }

        let Some(t) = self.tok(i) else {
            return i;
        };
        let mut end = match t.kind {
            TokenKind::Ident if t.text == "new" => {
                return self.skip_type_operand(i + 1);
            }
            TokenKind::Ident if t.text == "import" && self.is(i + 1, "(") => self.matching(i + 1) + 1,
            TokenKind::Ident => {
                let mut j = i + 1;
                while self.is(j, ".") && self.kind(j + 1) == Some(TokenKind::Ident) {
                    j += 2;
                }
                if self.is(j, "<") {
                    if let Some(m) = self.match_angle(j) {
                        j = m + 1;
                    }
                }
                if self.word(j, "is") {
                    return self.skip_type(j + 1);
                }
                j
            }
            TokenKind::String | TokenKind::Number | TokenKind::Template => i + 1,
            TokenKind::Punct => match t.text {
                "-" if self.kind(i + 1) == Some(TokenKind::Number) => i + 2,
                "(" => {
                    let close = self.matching(i) + 1;
                    if self.is(close, "=>") {
                        return self.skip_type(close + 1);
                    }
                    close
                }
                "<" => match self.match_angle(i) {
                    Some(m) if self.is(m + 1, "(") => {
                        let close = self.matching(m + 1) + 1;
                        if self.is(close, "=>") {
                            return self.skip_type(close + 1);
                        }
                        close
                    }
                    _ => return i,
                },
                "{" | "[" => self.matching(i) + 1,
                _ => return i,
            },
            _ => return i,
        };

        // array and indexed access types
        while self.is(end, "[") && !self.newline_before(end) {
            end = self.matching(end) + 1;
        }
        end
    }

    // ---- statements ---------------------------------------------------

    fn stmt_start(&self, i: usize) -> bool {
        if i == 0 {
            return true;
        }
        if self.is(i - 1, ";") || self.is(i - 1, "{") || self.is(i - 1, "}") {
            return true;
        }
        self.newline_before(i) && matches!(self.top(), None | Some(Frame::Block))
    }

    /// Start of a declaration whose keyword is at `i`, including `export [default]`
    fn declaration_start(&self, i: usize) -> Option<usize> {
        if self.stmt_start(i) {
            return Some(i);
        }
        if i >= 1 && self.word(i - 1, "export") && self.stmt_start(i - 1) {
            return Some(i - 1);
        }
        if i >= 2 && self.word(i - 1, "default") && self.word(i - 2, "export") && self.stmt_start(i - 2) {
            return Some(i - 2);
        }
        None
    }

    fn continues_statement(&self, i: usize) -> bool {
        self.tok(i).is_some_and(|t| {
            t.kind == TokenKind::Punct
                && matches!(t.text, "|" | "&" | "." | "," | "=" | "=>" | "<" | ":" | "?" | "(" | "[" | "{")
        })
    }

    /// End (exclusive) of the statement or class member starting at `i`
    fn statement_end(&self, i: usize) -> usize {
        let mut j = i;
        while j < self.sig.len() {
            if j > i
                && self.newline_before(j)
                && self.tok(j - 1).is_some_and(|t| t.ends_expression())
                && !self.continues_statement(j)
            {
                return j;
            }
            let t = &self.toks[self.sig[j]];
            if t.kind == TokenKind::Punct {
                match t.text {
                    ";" => return j + 1,
                    "}" | ")" | "]" => return j,
                    "{" => {
                        let close = self.matching(j);
                        return if self.is(close + 1, ";") { close + 2 } else { close + 1 };
                    }
                    "(" | "[" => {
                        j = self.matching(j) + 1;
                        continue;
                    }
                    _ => {}
                }
            }
            j += 1;
        }
        j
    }

    fn run(&mut self) -> Result<(), LexError> {
        let mut i = 0;
        while i < self.sig.len() {
            if self.is_masked(i) {
                i += 1;
                continue;
            }
            i = self.step(i)?;
        }
        Ok(())
    }

    fn step(&mut self, i: usize) -> Result<usize, LexError> {
        if self.class_member_start(i) {
            if let Some(next) = self.class_member(i) {
                return Ok(next);
            }
            if self.is_masked(i) {
                return Ok(i + 1);
            }
        }

        let Some(tok) = self.tok(i).copied() else {
            return Ok(i + 1);
        };

        match tok.kind {
            TokenKind::Ident => self.ident(i, tok.text),
            TokenKind::String => {
                self.clause = false;
                Ok(i + 1)
            }
            TokenKind::Punct => Ok(self.punct(i, tok.text)),
            _ => Ok(i + 1),
        }
    }

    fn ident(&mut self, i: usize, text: &str) -> Result<usize, LexError> {
        if matches!(self.top(), Some(Frame::Params { .. })) {
            if let Some(next) = self.param_modifier(i, text) {
                return Ok(next);
            }
        }
        if matches!(self.top(), Some(Frame::ImportExport)) {
            return Ok(self.type_specifier(i, text));
        }

        match text {
            "interface" if self.kind(i + 1) == Some(TokenKind::Ident) => {
                if let Some(start) = self.declaration_start(i) {
                    let mut open = i + 2;
                    while open < self.sig.len() && !self.is(open, "{") {
                        open += 1;
                    }
                    let end = self.matching(open) + 1;
                    self.mask(start, end);
                    return Ok(end);
                }
            }
            "type" if self.kind(i + 1) == Some(TokenKind::Ident)
                && (self.is(i + 2, "=") || self.is(i + 2, "<")) =>
            {
                if let Some(start) = self.declaration_start(i) {
                    let mut j = i + 2;
                    if self.is(j, "<") {
                        j = self.match_angle(j).map_or(j, |m| m + 1);
                    }
                    if self.is(j, "=") {
                        let mut end = self.skip_type(j + 1);
                        if self.is(end, ";") {
                            end += 1;
                        }
                        self.mask(start, end);
                        return Ok(end);
                    }
                }
            }
            "declare" if self.tok(i + 1).is_some_and(|t| DECLARE_TARGETS.contains(&t.text)) => {
                if let Some(start) = self.declaration_start(i) {
                    let end = self.statement_end(i + 1);
                    self.mask(start, end);
                    return Ok(end);
                }
            }
            "enum" if self.kind(i + 1) == Some(TokenKind::Ident) => {
                if let Some(start) = self.declaration_start(i) {
                    let keep_export = self.word(start, "export");
                    let from = if keep_export { start + 1 } else { start };
                    return self.lower_enum(from, i);
                }
            }
            "const" if self.word(i + 1, "enum") && self.kind(i + 2) == Some(TokenKind::Ident) => {
                if let Some(start) = self.declaration_start(i) {
                    let from = if self.word(start, "export") { start + 1 } else { start };
                    return self.lower_enum(from, i + 1);
                }
            }
            "let" | "const" | "var"
                if matches!(self.kind(i + 1), Some(TokenKind::Ident)) || self.is(i + 1, "{") || self.is(i + 1, "[") =>
            {
                self.decl = Some(Declaration {
                    depth: self.stack.len(),
                    expect_annotation: true,
                });
            }
            "import" if self.stmt_start(i) => return Ok(self.import(i)),
            "export" if self.stmt_start(i) => return Ok(self.export(i)),
            "abstract" if self.word(i + 1, "class") => {
                self.mask(i, i + 1);
            }
            "class" => return Ok(self.class_heading(i)),
            "function" => {
                let head = if i >= 1 && self.word(i - 1, "async") { i - 1 } else { i };
                self.fn_start = Some(self.declaration_start(head).unwrap_or(head));
            }
            "as" | "satisfies" => {
                if let Some(end) = self.cast(i) {
                    return Ok(end);
                }
            }
            _ => {}
        }
        Ok(i + 1)
    }

    fn import(&mut self, i: usize) -> usize {
        let type_only = self.word(i + 1, "type") && !(self.is(i + 2, ",") || self.word(i + 2, "from"));
        if type_only {
            let mut end = i + 1;
            while end < self.sig.len() && self.kind(end) != Some(TokenKind::String) {
                end += 1;
            }
            end += 1;
            if self.is(end, ";") {
                end += 1;
            }
            self.mask(i, end);
            return end;
        }
        if self.kind(i + 1) != Some(TokenKind::String) && !self.is(i + 1, "(") && !self.is(i + 1, ".") {
            self.clause = true;
        }
        i + 1
    }

    fn export(&mut self, i: usize) -> usize {
        if self.word(i + 1, "type") && self.is(i + 2, "{") {
            let mut end = self.matching(i + 2) + 1;
            if self.word(end, "from") {
                end += 2;
            }
            if self.is(end, ";") {
                end += 1;
            }
            self.mask(i, end);
            return end;
        }
        if self.is(i + 1, "{") || self.is(i + 1, "*") {
            self.clause = true;
        }
        i + 1
    }

    /// `type Foo` inside `import { ... }` / `export { ... }`
    fn type_specifier(&mut self, i: usize, text: &str) -> usize {
        let is_type_modifier = text == "type"
            && self.kind(i + 1) == Some(TokenKind::Ident)
            && !self.word(i + 1, "as");
        if !is_type_modifier {
            return i + 1;
        }
        let mut end = i + 1;
        while end < self.sig.len() && !self.is(end, ",") && !self.is(end, "}") {
            end += 1;
        }
        if self.is(end, ",") {
            end += 1;
        }
        self.mask(i, end);
        end
    }

    fn class_heading(&mut self, i: usize) -> usize {
        let mut j = i + 1;
        if self.kind(j) == Some(TokenKind::Ident) && !self.word(j, "extends") && !self.word(j, "implements") {
            j += 1;
        }
        if self.is(j, "<") {
            if let Some(m) = self.match_angle(j) {
                self.mask(j, m + 1);
                j = m + 1;
            }
        }
        if self.word(j, "extends") {
            j += 1;
            while j < self.sig.len() && !self.is(j, "{") && !self.word(j, "implements") {
                if self.is(j, "<") {
                    if let Some(m) = self.match_angle(j) {
                        if self.is(m + 1, "{") || self.word(m + 1, "implements") {
                            self.mask(j, m + 1);
                            j = m + 1;
                            continue;
                        }
                    }
                }
                if self.is(j, "(") || self.is(j, "[") {
                    j = self.matching(j) + 1;
                } else {
                    j += 1;
                }
            }
        }
        if self.word(j, "implements") {
            let start = j;
            while j < self.sig.len() && !self.is(j, "{") {
                j += 1;
            }
            self.mask(start, j);
        }
        if self.is(j, "{") {
            self.pending_class_body = Some(j);
        }
        i + 1
    }

    fn cast(&mut self, i: usize) -> Option<usize> {
        let prev = self.prev_unmasked(i)?;
        if prev + 1 != i && self.is_masked(i - 1) {
            return None;
        }
        let prev_tok = self.tok(prev)?;
        let next_is_type = self.tok(i + 1).is_some_and(|t| match t.kind {
            TokenKind::Ident | TokenKind::String | TokenKind::Number | TokenKind::Template => true,
            TokenKind::Punct => matches!(t.text, "{" | "[" | "(" | "<"),
            _ => false,
        });
        if !prev_tok.ends_expression() || !next_is_type {
            return None;
        }
        let end = self.skip_type(i + 1);
        self.mask(i, end);
        Some(end)
    }

    fn lower_enum(&mut self, from: usize, enum_kw: usize) -> Result<usize, LexError> {
        let name = self.tok(enum_kw + 1).map(|t| t.text.to_string()).unwrap_or_default();
        let open = enum_kw + 2;
        if !self.is(open, "{") {
            let offset = self.tok(open).map_or(0, |t| t.start);
            return Err(LexError::new("Expected '{' after enum name", offset));
        }
        let close = self.matching(open);

        let mut members = Vec::new();
        let mut next_value: Option<i64> = Some(0);
        let mut j = open + 1;
        while j < close {
            let key_tok = self.tok(j).copied();
            let Some(key_tok) = key_tok else { break };
            let key = key_tok.text.to_string();
            j += 1;

            let value = if self.is(j, "=") {
                let init_start = j + 1;
                let mut k = init_start;
                while k < close && !self.is(k, ",") {
                    if self.is(k, "(") || self.is(k, "[") || self.is(k, "{") {
                        k = self.matching(k);
                    }
                    k += 1;
                }
                let (Some(first), Some(last)) = (self.tok(init_start), self.tok(k.saturating_sub(1))) else {
                    return Err(LexError::new("Expected enum initializer", key_tok.start));
                };
                let text = self.source_between(first.start, last.end());
                next_value = text.parse::<i64>().ok().map(|v| v + 1);
                j = k;
                text
            } else {
                let Some(value) = next_value else {
                    return Err(LexError::new("Enum member must have initializer", key_tok.start));
                };
                next_value = Some(value + 1);
                value.to_string()
            };
            members.push(format!("{key}: {value}"));

            if self.is(j, ",") {
                j += 1;
            }
        }

        let lowered = format!("const {name} = Object.freeze({{ {} }});", members.join(", "));
        self.mask(from, close + 1);
        self.replace.insert(self.sig[from], lowered);
        Ok(close + 1)
    }

    fn source_between(&self, start: usize, end: usize) -> String {
        self.toks
            .iter()
            .filter(|t| t.start >= start && t.end() <= end)
            .map(|t| t.text)
            .collect()
    }

    // ---- classes ------------------------------------------------------

    fn class_member_start(&self, i: usize) -> bool {
        let Some(Frame::ClassBody { open, in_initializer, .. }) = self.top() else {
            return false;
        };
        let Some(tok) = self.tok(i) else {
            return false;
        };
        let starts_member = match tok.kind {
            TokenKind::Ident | TokenKind::String | TokenKind::Number => true,
            TokenKind::Punct => matches!(tok.text, "[" | "*"),
            _ => false,
        };
        if !starts_member {
            return false;
        }
        match self.prev_unmasked(i) {
            Some(p) if p == *open => true,
            Some(p) if self.is(p, ";") || self.is(p, "}") => true,
            Some(p) => {
                self.newline_before(i)
                    && self.tok(p).is_some_and(|t| t.ends_expression())
                    && (!in_initializer || !self.continues_statement(i))
            }
            None => false,
        }
    }

    fn class_member(&mut self, i: usize) -> Option<usize> {
        if let Some(Frame::ClassBody { in_initializer, member_start, .. }) = self.stack.last_mut() {
            *in_initializer = false;
            *member_start = i;
        }

        if self.is(i, "[") && self.kind(i + 1) == Some(TokenKind::Ident) && self.is(i + 2, ":") {
            let end = self.statement_end(i);
            self.mask(i, end);
            return Some(end);
        }

        let mut k = i;
        while let Some(t) = self.tok(k).copied() {
            let is_modifier = t.kind == TokenKind::Ident
                && MEMBER_MODIFIERS.contains(&t.text)
                && self.tok(k + 1).is_some_and(|n| match n.kind {
                    TokenKind::Ident | TokenKind::String | TokenKind::Number => true,
                    TokenKind::Punct => matches!(n.text, "[" | "*"),
                    _ => false,
                });
            if !is_modifier {
                break;
            }
            if t.text == "declare" || t.text == "abstract" {
                let end = self.statement_end(i);
                self.mask(i, end);
                return Some(end);
            }
            self.mask(k, k + 1);
            k += 1;
        }

        while (self.tok(k).is_some_and(|t| matches!(t.text, "static" | "async" | "get" | "set" | "accessor"))
            && !matches!(
                self.tok(k + 1).map(|t| t.text),
                Some("(" | "=" | ":" | ";" | "?" | "!" | "<" | "}")
            ))
            || self.is(k, "*")
        {
            k += 1;
        }

        let mut n = if self.is(k, "[") { self.matching(k) + 1 } else { k + 1 };
        if self.is(n, "?") || self.is(n, "!") {
            self.mask(n, n + 1);
            n += 1;
        }
        if self.is(n, "<") {
            if let Some(m) = self.match_angle(n) {
                self.mask(n, m + 1);
                n = m + 1;
            }
        }
        if self.is(n, ":") {
            let end = self.skip_type(n + 1);
            self.mask(n, end);
        }
        None
    }

    // ---- parameters ---------------------------------------------------

    fn at_param_start(&self, i: usize) -> bool {
        self.prev_unmasked(i)
            .is_some_and(|p| self.is(p, "(") || self.is(p, ","))
    }

    fn param_modifier(&mut self, i: usize, text: &str) -> Option<usize> {
        if !self.at_param_start(i) {
            return None;
        }
        if text == "this" && self.is(i + 1, ":") {
            let mut end = self.skip_type(i + 2);
            if self.is(end, ",") {
                end += 1;
            }
            self.mask(i, end);
            return Some(end);
        }
        if !PARAM_MODIFIERS.contains(&text) {
            return None;
        }
        let mut k = i;
        while self.tok(k).is_some_and(|t| t.kind == TokenKind::Ident && PARAM_MODIFIERS.contains(&t.text))
            && matches!(self.kind(k + 1), Some(TokenKind::Ident))
        {
            k += 1;
        }
        if k == i {
            return None;
        }
        self.mask(i, k);
        let name = self.tok(k).map(|t| t.text.to_string());
        if let (Some(Frame::Params { ctor: true, props, .. }), Some(name)) = (self.stack.last_mut(), name) {
            props.push(name);
        }
        Some(k)
    }

    fn is_function_head(&self, open: usize) -> bool {
        let Some(p) = self.prev_unmasked(open) else {
            return false;
        };
        if self.word(p, "function") {
            return true;
        }
        self.kind(p) == Some(TokenKind::Ident)
            && p >= 1
            && (self.word(p - 1, "function") || (self.is(p - 1, "*") && p >= 2 && self.word(p - 2, "function")))
    }

    fn open_paren(&mut self, i: usize) -> usize {
        let close = self.matching(i);
        let prev = self.prev_unmasked(i);
        let control = prev.is_some_and(|p| {
            self.tok(p)
                .is_some_and(|t| matches!(t.text, "if" | "while" | "for" | "switch" | "with") && t.kind == TokenKind::Ident)
        });
        let in_class = matches!(self.top(), Some(Frame::ClassBody { in_initializer: false, .. }));
        let in_object = matches!(self.top(), Some(Frame::Object));
        let fn_head = self.is_function_head(i);
        let is_catch = prev.is_some_and(|p| self.word(p, "catch"));
        let method_name = prev.is_some_and(|p| {
            self.tok(p).is_some_and(|t| {
                matches!(t.kind, TokenKind::Ident | TokenKind::String | TokenKind::Number) || t.is("]")
            })
        });

        let params = if control {
            false
        } else if in_class || fn_head || self.is(close + 1, "=>") {
            true
        } else if self.is(close + 1, ":") {
            let end = self.skip_type(close + 2);
            self.is(end, "=>") || (self.is(end, "{") && in_object && method_name)
        } else {
            self.is(close + 1, "{") && (is_catch || (in_object && method_name))
        };

        if !params {
            self.stack.push(Frame::Paren);
            return i + 1;
        }

        let mut after = close + 1;
        if self.is(after, ":") {
            let end = self.skip_type(after + 1);
            self.mask(after, end);
            after = end;
        }

        if (fn_head || in_class) && !self.is(after, "{") && !self.is(after, "=>") {
            let start = if in_class {
                match self.top() {
                    Some(Frame::ClassBody { member_start, .. }) => *member_start,
                    _ => i,
                }
            } else {
                self.fn_start.unwrap_or(i)
            };
            let end = if self.is(after, ";") { after + 1 } else { after };
            self.mask(start, end);
            return end;
        }

        let ctor = in_class && prev.is_some_and(|p| self.word(p, "constructor"));
        self.stack.push(Frame::Params {
            in_default: false,
            ctor,
            props: Vec::new(),
        });
        i + 1
    }

    /// `this.x = x;` for constructor parameter properties
    fn assign_param_props(&mut self, close: usize, props: Vec<String>) {
        let body = self.next_unmasked(close + 1);
        if props.is_empty() || !self.is(body, "{") {
            return;
        }
        let body_end = self.matching(body);
        let mut anchor = body;
        let mut j = body + 1;
        while j < body_end {
            if self.word(j, "super") && self.is(j + 1, "(") {
                anchor = self.matching(j + 1);
                if self.is(anchor + 1, ";") {
                    anchor += 1;
                }
                break;
            }
            if self.is(j, "{") || self.is(j, "(") || self.is(j, "[") {
                j = self.matching(j);
            }
            j += 1;
        }
        let assignments: String = props.iter().map(|p| format!(" this.{p} = {p};")).collect();
        self.insert_after.entry(self.sig[anchor]).or_default().push_str(&assignments);
    }

    // ---- punctuation --------------------------------------------------

    fn punct(&mut self, i: usize, text: &str) -> usize {
        match text {
            "(" => return self.open_paren(i),
            "[" => self.stack.push(Frame::Bracket),
            "{" => {
                let frame = if self.pending_class_body == Some(i) {
                    self.pending_class_body = None;
                    Frame::ClassBody {
                        open: i,
                        in_initializer: false,
                        member_start: i + 1,
                    }
                } else if self.clause {
                    Frame::ImportExport
                } else if self.is_block(i) {
                    Frame::Block
                } else {
                    Frame::Object
                };
                self.stack.push(frame);
            }
            ")" | "]" | "}" => {
                if let Some(Frame::Params { ctor: true, props, .. }) = self.stack.pop() {
                    self.assign_param_props(i, props);
                }
                if self.decl.is_some_and(|d| self.stack.len() < d.depth) {
                    self.decl = None;
                }
            }
            ":" => {
                let annotate = match self.top() {
                    Some(Frame::Params { in_default, .. }) => !in_default,
                    _ => self
                        .decl
                        .is_some_and(|d| d.expect_annotation && d.depth == self.stack.len()),
                };
                if annotate {
                    let end = self.skip_type(i + 1);
                    self.mask(i, end);
                    return end;
                }
            }
            "?" => {
                if matches!(self.top(), Some(Frame::Params { in_default: false, .. }))
                    && self.tok(i + 1).is_some_and(|t| matches!(t.text, ":" | "," | ")" | "="))
                {
                    self.mask(i, i + 1);
                }
            }
            "!" => {
                let adjacent = i >= 1 && self.sig[i - 1] + 1 == self.sig[i] && !self.is_masked(i - 1);
                let after_expression = adjacent
                    && self
                        .tok(i - 1)
                        .is_some_and(|t| t.ends_expression() && t.kind != TokenKind::Number);
                if after_expression {
                    self.mask(i, i + 1);
                }
            }
            "<" => {
                if let Some(m) = self.match_angle(i) {
                    let prev = self.prev_unmasked(i).and_then(|p| self.tok(p));
                    let after_name = prev.is_some_and(|t| t.kind == TokenKind::Ident && t.ends_expression());
                    let call_follows = self.is(m + 1, "(") || self.kind(m + 1) == Some(TokenKind::Template);
                    let expression_start = prev.map_or(true, |t| !t.ends_expression());
                    if (after_name && call_follows) || expression_start {
                        self.mask(i, m + 1);
                        return m + 1;
                    }
                }
            }
            "=" | "," => {
                let depth = self.stack.len();
                let assign = text == "=";
                match self.stack.last_mut() {
                    Some(Frame::Params { in_default, .. }) => *in_default = assign,
                    Some(Frame::ClassBody { in_initializer, .. }) if assign => *in_initializer = true,
                    _ => {
                        if let Some(d) = self.decl.as_mut().filter(|d| d.depth == depth) {
                            d.expect_annotation = !assign;
                        }
                    }
                }
            }
            ";" => {
                self.clause = false;
                if self.decl.is_some_and(|d| d.depth == self.stack.len()) {
                    self.decl = None;
                }
            }
            _ => {}
        }
        i + 1
    }

    fn is_block(&self, i: usize) -> bool {
        let Some(p) = self.prev_unmasked(i) else {
            return true;
        };
        let Some(t) = self.tok(p) else {
            return true;
        };
        match t.kind {
            TokenKind::Punct => matches!(t.text, ")" | ";" | "{" | "}" | "=>"),
            TokenKind::Ident => matches!(t.text, "else" | "do" | "try" | "finally"),
            _ => false,
        }
    }

    // ---- output -------------------------------------------------------

    fn render(&self) -> String {
        let mut out = String::new();
        let mut after_mask = false;
        for (k, tok) in self.toks.iter().enumerate() {
            if let Some(replacement) = self.replace.get(&k) {
                out.push_str(replacement);
                out.extend(std::iter::repeat('\n').take(tok.newlines()));
                after_mask = false;
            } else if self.masked[k] {
                out.extend(std::iter::repeat('\n').take(tok.newlines()));
                after_mask = true;
            } else {
                if after_mask && !tok.is_trivia() {
                    let glue = out.chars().last().is_some_and(is_word_char)
                        && tok.text.chars().next().is_some_and(is_word_char);
                    if glue {
                        out.push(' ');
                    }
                }
                out.push_str(tok.text);
                after_mask = false;
            }
            if let Some(extra) = self.insert_after.get(&k) {
                out.push_str(extra);
            }
        }
        out
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
