//! Bare import specifier → CDN URL rewriting

use pen_adapters::script::{significant, tokenize, LexError, Token, TokenKind};
use pen_adapters::CompilerCache;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Curated mappings for packages whose default ESM build is not what a
/// browser preview wants
pub const BUILTIN_OVERRIDES: &[(&str, &str)] = &[
    ("tailwindcss", "https://cdn.tailwindcss.com"),
    (
        "tailwindcss/preflight",
        "https://cdn.jsdelivr.net/npm/tailwindcss@3/src/css/preflight.css",
    ),
    ("vue", "https://unpkg.com/vue@3/dist/vue.esm-browser.js"),
    ("three", "https://unpkg.com/three@latest/build/three.module.js"),
    ("d3", "https://cdn.jsdelivr.net/npm/d3@7/+esm"),
];

pub const FALLBACK_CDN: &str = "https://esm.run/";

const CSS_IMPORT_KEY: &str = "cdn.css-import";

/// `@import "a"`, `@import url("a")`
fn css_import_pattern() -> Result<Regex, regex::Error> {
    Regex::new(r#"(@import\s+(?:url\(\s*)?)(["'])([^"'\n]+)(["'])"#)
}

/// A quoted module specifier found in a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Specifier<'a> {
    /// Byte range of the unquoted text
    start: usize,
    end: usize,
    text: &'a str,
}

/// Where the scanner is inside an `import`/`export` statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    None,
    /// After `import`/`export`, waiting for `from` or a side-effect string
    Open,
    /// After `from`
    From,
    /// After `import(`
    Dynamic,
}

/// Specifiers of static, side-effect, re-export and dynamic imports.
/// Quoted text anywhere else is never reported.
fn module_specifiers(js: &str) -> Result<Vec<Specifier<'_>>, LexError> {
    let tokens = tokenize(js)?;
    let mut found = Vec::new();
    let mut clause = Clause::None;
    let mut prev: Option<&Token<'_>> = None;

    for token in significant(&tokens) {
        let after_dot = prev.is_some_and(|p| p.is(".") || p.is("?."));
        let after_import = prev.is_some_and(|p| p.is_word("import"));

        let takes_string = match clause {
            Clause::From | Clause::Dynamic => true,
            Clause::Open => after_import,
            Clause::None => false,
        };
        clause = if token.kind == TokenKind::String && takes_string {
            if let Some(specifier) = quoted(token) {
                found.push(specifier);
            }
            Clause::None
        } else if token.kind == TokenKind::Ident && !after_dot && matches!(token.text, "import" | "export") {
            Clause::Open
        } else {
            match clause {
                Clause::Open if token.is_word("from") => Clause::From,
                Clause::Open if token.is("(") && after_import => Clause::Dynamic,
                Clause::Open if token.is(";") || token.is("=") => Clause::None,
                Clause::Open => Clause::Open,
                _ => Clause::None,
            }
        };
        prev = Some(token);
    }
    Ok(found)
}

fn quoted<'a>(token: &Token<'a>) -> Option<Specifier<'a>> {
    let text = token.text.get(1..token.text.len().checked_sub(1)?)?;
    if text.contains('\\') {
        return None;
    }
    Some(Specifier {
        start: token.start + 1,
        end: token.end() - 1,
        text,
    })
}

/// Rewrites bare specifiers using project overrides, then the built-in
/// table, then the generic CDN
#[derive(Clone)]
pub struct CdnTransformer {
    overrides: BTreeMap<String, String>,
    css_import: Arc<Regex>,
}

impl std::fmt::Debug for CdnTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdnTransformer")
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

impl CdnTransformer {
    pub fn new(overrides: &BTreeMap<String, String>) -> Result<Self, regex::Error> {
        Ok(Self {
            overrides: overrides.clone(),
            css_import: Arc::new(css_import_pattern()?),
        })
    }

    /// Same as [`CdnTransformer::new`], reusing the pattern compiled earlier
    /// through `cache`
    pub fn cached(overrides: &BTreeMap<String, String>, cache: &CompilerCache) -> Result<Self, regex::Error> {
        Ok(Self {
            overrides: overrides.clone(),
            css_import: cache.get_or_try_init(CSS_IMPORT_KEY, css_import_pattern)?,
        })
    }

    /// URL a bare specifier resolves to
    ///
    /// A project override naming another bare package is an alias and
    /// resolves through the built-in table and the generic CDN in turn.
    pub fn resolve(&self, specifier: &str) -> String {
        let stripped = strip_version(specifier);
        let project = |name: &str| self.overrides.get(name).cloned();

        match project(specifier).or_else(|| stripped.and_then(project)) {
            Some(target) if is_bare(&target) => resolve_builtin(&target),
            Some(target) => target,
            None => resolve_builtin(specifier),
        }
    }

    /// Rewrite static, side-effect, re-export and dynamic imports
    pub fn transform_js(&self, js: &str) -> String {
        let specifiers = match module_specifiers(js) {
            Ok(specifiers) => specifiers,
            Err(e) => {
                tracing::debug!(error = %e, "Script does not tokenize, imports left as written");
                return js.to_string();
            }
        };

        let mut out = String::with_capacity(js.len());
        let mut last = 0;
        for specifier in specifiers.iter().filter(|s| is_bare(s.text)) {
            let url = self.resolve(specifier.text);
            tracing::trace!(specifier = specifier.text, url = %url, "Rewrote import");
            out.push_str(&js[last..specifier.start]);
            out.push_str(&url);
            last = specifier.end;
        }
        out.push_str(&js[last..]);
        out
    }

    /// Rewrite quoted `@import`s in a stylesheet
    pub fn transform_css_imports(&self, css: &str) -> String {
        self.css_import
            .replace_all(css, |caps: &Captures| {
                let specifier = &caps[3];
                if caps[2] != caps[4] || !is_bare(specifier) {
                    return caps[0].to_string();
                }
                format!("{}{}{}{}", &caps[1], &caps[2], self.resolve(specifier), &caps[4])
            })
            .into_owned()
    }

    /// Bare specifiers imported by `js`, in first-seen order
    pub fn extract_imports(&self, js: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for specifier in module_specifiers(js).unwrap_or_default() {
            if is_bare(specifier.text) && !found.iter().any(|s| s == specifier.text) {
                found.push(specifier.text.to_string());
            }
        }
        found
    }
}

fn resolve_builtin(specifier: &str) -> String {
    let builtin = |name: &str| {
        BUILTIN_OVERRIDES
            .iter()
            .find(|(package, _)| *package == name)
            .map(|(_, url)| url.to_string())
    };
    builtin(specifier)
        .or_else(|| strip_version(specifier).and_then(builtin))
        .unwrap_or_else(|| format!("{FALLBACK_CDN}{specifier}"))
}

/// `react@18` → `react`, `@scope/pkg@2` → `@scope/pkg`
fn strip_version(specifier: &str) -> Option<&str> {
    match specifier.rfind('@') {
        Some(at) if at > 0 => Some(&specifier[..at]),
        _ => None,
    }
}

pub fn is_bare(specifier: &str) -> bool {
    let relative = specifier.starts_with('.') || specifier.starts_with('/');
    let url = specifier.contains("://") || specifier.starts_with("data:") || specifier.starts_with("blob:");
    !specifier.is_empty() && !relative && !url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformer(overrides: &[(&str, &str)]) -> CdnTransformer {
        let map = overrides
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CdnTransformer::new(&map).unwrap()
    }

    #[test]
    fn test_fallback_keeps_subpath_and_scope() {
        let cdn = transformer(&[]);
        assert_eq!(cdn.resolve("lodash"), "https://esm.run/lodash");
        assert_eq!(cdn.resolve("react-dom/client"), "https://esm.run/react-dom/client");
        assert_eq!(cdn.resolve("@vue/reactivity"), "https://esm.run/@vue/reactivity");
    }

    #[test]
    fn test_builtin_ignores_version() {
        let cdn = transformer(&[]);
        assert_eq!(cdn.resolve("vue@3.4"), "https://unpkg.com/vue@3/dist/vue.esm-browser.js");
        assert_eq!(cdn.resolve("d3"), "https://cdn.jsdelivr.net/npm/d3@7/+esm");
    }

    #[test]
    fn test_strip_version() {
        assert_eq!(strip_version("react@18"), Some("react"));
        assert_eq!(strip_version("@scope/pkg@2"), Some("@scope/pkg"));
        assert_eq!(strip_version("@scope/pkg"), None);
        assert_eq!(strip_version("lodash"), None);
    }

    #[test]
    fn test_every_import_form() {
        let cdn = transformer(&[]);
        let js = r#"import a from "a";
import { b } from 'b';
import * as c from "c";
import "d";
export { e } from "e";
const f = await import("f");
import g from "./g.js";
import h from "https://x.dev/h.js";"#;

        let out = cdn.transform_js(js);
        assert!(out.contains(r#"import a from "https://esm.run/a";"#));
        assert!(out.contains(r#"import { b } from 'https://esm.run/b';"#));
        assert!(out.contains(r#"import * as c from "https://esm.run/c";"#));
        assert!(out.contains(r#"import "https://esm.run/d";"#));
        assert!(out.contains(r#"export { e } from "https://esm.run/e";"#));
        assert!(out.contains(r#"import("https://esm.run/f")"#));
        assert!(out.contains(r#"from "./g.js""#));
        assert!(out.contains(r#"from "https://x.dev/h.js""#));
    }

    #[test]
    fn test_css_imports() {
        let cdn = transformer(&[]);
        let css = "@import \"tailwindcss/preflight\";\n@import url('./local.css');\n@import \"theme.css\";";
        let out = cdn.transform_css_imports(css);
        assert!(out.starts_with(
            "@import \"https://cdn.jsdelivr.net/npm/tailwindcss@3/src/css/preflight.css\";"
        ));
        assert!(out.contains("url('./local.css')"));
        assert!(out.contains("@import \"https://esm.run/theme.css\";"));
    }

    #[test]
    fn test_extract_imports() {
        let cdn = transformer(&[]);
        let js = "import a from 'a';\nimport './x.js';\nimport b from 'a';\nimport('c');";
        assert_eq!(cdn.extract_imports(js), vec!["a", "c"]);
    }

    #[test]
    fn test_mismatched_quotes_untouched() {
        let cdn = transformer(&[]);
        assert_eq!(cdn.transform_js("import a from \"a';"), "import a from \"a';");
    }

    #[test]
    fn test_string_literals_are_not_imports() {
        let cdn = transformer(&[]);
        let js = "import x from 'x';\nconsole.log(\"hello from 'Pen'\");\nconst msg = 'pick from \"menu\"';\nconst y = import.meta.resolve('z');\nexport default 'w';";
        let out = cdn.transform_js(js);
        assert!(out.starts_with("import x from 'https://esm.run/x';\n"));
        assert!(out.contains("console.log(\"hello from 'Pen'\");"));
        assert!(out.contains("const msg = 'pick from \"menu\"';"));
        assert!(out.contains("import.meta.resolve('z')"));
        assert!(out.contains("export default 'w';"));
        assert_eq!(cdn.extract_imports(js), vec!["x"]);
    }

    #[test]
    fn test_multiline_import_clause() {
        let cdn = transformer(&[]);
        let js = "import {\n  a,\n  b,\n} from \"pkg\";\nexport * from './local.js';";
        let out = cdn.transform_js(js);
        assert!(out.contains("} from \"https://esm.run/pkg\";"));
        assert!(out.contains("export * from './local.js';"));
    }

    #[test]
    fn test_alias_override_resolves_to_url() {
        let cdn = transformer(&[("react", "preact/compat"), ("vue@3", "vue")]);
        assert_eq!(cdn.resolve("react"), "https://esm.run/preact/compat");
        assert_eq!(cdn.resolve("vue@3"), "https://unpkg.com/vue@3/dist/vue.esm-browser.js");
    }

    #[test]
    fn test_transform_is_idempotent() {
        let cdn = transformer(&[("react", "react-shim"), ("lodash", "https://x.dev/lodash.js")]);
        let js = "import React from 'react';\nimport _ from \"lodash\";\nimport 'd3';\nconst m = await import('three');";
        let once = cdn.transform_js(js);
        assert_eq!(cdn.transform_js(&once), once);
        assert!(once.contains("'https://esm.run/react-shim'"));

        let css = "@import \"tailwindcss/preflight\";\n@import url('theme.css');";
        let once = cdn.transform_css_imports(css);
        assert_eq!(cdn.transform_css_imports(&once), once);
    }
}
