use super::lexer::{check_balanced, tokenize, LexError, Token, TokenKind};

const INDENT: &str = "  ";

/// Re-indent script source by bracket depth
///
/// Statements that share a line are split: a line break follows the `{`
/// of a block, each statement-ending `;` and the `}` closing a block.
/// Object literals and `for (;;)` headers stay on their line. Otherwise tokens
/// are kept as written; only leading indentation, trailing spaces and runs
/// of blank lines change. Lines inside template literals and block comments
/// are left alone.
pub fn format_js(src: &str) -> Result<String, LexError> {
    let tokens = tokenize(src)?;
    check_balanced(&tokens)?;
    let breaks = break_points(&tokens);

    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut depth: usize = 0;
    let mut at_line_start = true;
    let mut blank_run = 0;

    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Newline => {
                end_line(&mut lines, &mut line, &mut blank_run);
                at_line_start = true;
                continue;
            }
            TokenKind::Whitespace if at_line_start => continue,
            _ => {}
        }

        if at_line_start {
            at_line_start = false;
            let closes = token.kind == TokenKind::Punct && matches!(token.text, ")" | "]" | "}");
            let line_depth = if closes { depth.saturating_sub(1) } else { depth };
            line.push_str(&INDENT.repeat(line_depth));
        }

        if token.kind == TokenKind::Punct {
            match token.text {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => depth = depth.saturating_sub(1),
                _ => {}
            }
        }

        // multi-line literals and comments carry their own layout
        line.push_str(token.text);

        if breaks[index] && continues_on_line(&tokens[index + 1..]) {
            end_line(&mut lines, &mut line, &mut blank_run);
            at_line_start = true;
        }
    }

    let finished = line.trim_end().to_string();
    if !finished.is_empty() {
        lines.push(finished);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

fn end_line(lines: &mut Vec<String>, line: &mut String, blank_run: &mut usize) {
    let finished = line.trim_end().to_string();
    if finished.is_empty() {
        *blank_run += 1;
        if *blank_run <= 1 && !lines.is_empty() {
            lines.push(String::new());
        }
    } else {
        *blank_run = 0;
        lines.push(finished);
    }
    line.clear();
}

/// Whether more code follows on the current source line
fn continues_on_line(rest: &[Token<'_>]) -> bool {
    match rest.iter().find(|t| t.kind != TokenKind::Whitespace) {
        Some(next) => !matches!(next.kind, TokenKind::Newline | TokenKind::LineComment),
        None => false,
    }
}

/// `{` after these starts a statement block rather than an object literal
fn opens_block(prev: Option<&Token<'_>>) -> bool {
    match prev {
        None => true,
        Some(t) => {
            t.is(")")
                || t.is("=>")
                || t.is(";")
                || t.is("}")
                || (t.kind == TokenKind::Ident && matches!(t.text, "else" | "try" | "finally" | "do"))
        }
    }
}

/// Token indices that a line break should follow
fn break_points(tokens: &[Token<'_>]) -> Vec<bool> {
    let mut breaks = vec![false; tokens.len()];
    // (is a block, index of the opening token)
    let mut open: Vec<(bool, usize)> = Vec::new();
    let mut prev: Option<usize> = None;
    let mut class_header = false;

    let next_significant = |from: usize| tokens[from + 1..].iter().find(|t| !t.is_trivia());

    for (index, token) in tokens.iter().enumerate() {
        if token.is_trivia() {
            continue;
        }
        if token.kind == TokenKind::Punct {
            match token.text {
                "{" => {
                    let block = class_header || opens_block(prev.map(|p| &tokens[p]));
                    class_header = false;
                    open.push((block, index));
                    if block && !next_significant(index).is_some_and(|t| t.is("}")) {
                        breaks[index] = true;
                    }
                }
                "(" | "[" => open.push((false, index)),
                "}" => {
                    if let Some((true, opened)) = open.pop() {
                        if let Some(last) = prev.filter(|p| *p != opened) {
                            breaks[last] = true;
                        }
                        let joined = next_significant(index).is_some_and(|t| {
                            matches!(t.text, "else" | "catch" | "finally" | "while" | ")" | "]" | "," | ";" | "." | "?.")
                        });
                        breaks[index] = !joined;
                    }
                }
                ")" | "]" => {
                    open.pop();
                }
                ";" => breaks[index] = !open.last().is_some_and(|(block, _)| !block),
                _ => {}
            }
        } else if token.is_word("class") {
            class_header = true;
        }
        prev = Some(index);
    }
    breaks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reindents_blocks() {
        let src = "function f() {\nif (x) {\n    return [\n1,\n2\n]\n}\n}";
        let expected = "function f() {\n  if (x) {\n    return [\n      1,\n      2\n    ]\n  }\n}\n";
        assert_eq!(format_js(src).unwrap(), expected);
    }

    #[test]
    fn test_collapses_blank_lines_and_trailing_space() {
        let src = "a();   \n\n\n\nb();\n\n";
        assert_eq!(format_js(src).unwrap(), "a();\n\nb();\n");
    }

    #[test]
    fn test_template_lines_untouched() {
        let src = "const html = `\n    <p>\n  ${x}\n`;\n";
        assert_eq!(format_js(src).unwrap(), src);
    }

    #[test]
    fn test_idempotent() {
        let src = "class A {\n  m() {\n    return { a: 1 };\n  }\n}\n";
        let once = format_js(src).unwrap();
        assert_eq!(format_js(&once).unwrap(), once);
        assert_eq!(once, src);
    }

    #[test]
    fn test_unbalanced_fails() {
        let err = format_js("function f() {\n").unwrap_err();
        assert_eq!(err.message, "Unclosed '{'");
    }

    #[test]
    fn test_splits_minified_statements() {
        assert_eq!(format_js("function f(){return 1}").unwrap(), "function f(){\n  return 1\n}\n");
        assert_eq!(
            format_js("if(a){b();c()}else{d()}e();").unwrap(),
            "if(a){\n  b();\n  c()\n}else{\n  d()\n}\ne();\n"
        );
    }

    #[test]
    fn test_objects_and_loop_headers_stay_inline() {
        let src = "const o = { a: 1, b: [2] };\nfor (let i = 0; i < 3; i++) {}\n";
        assert_eq!(format_js(src).unwrap(), src);
    }
}
