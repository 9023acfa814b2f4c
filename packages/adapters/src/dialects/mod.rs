//! Built-in dialects

mod css;
mod html;
mod javascript;
mod jsx;
mod markdown;
mod python;
mod sass;
mod shorthand;
mod typescript;

pub use css::{CssAdapter, CssFactory};
pub use html::{HtmlAdapter, HtmlFactory};
pub use javascript::{JavaScriptAdapter, JavaScriptFactory};
pub use jsx::{JsxAdapter, JsxFactory};
pub use markdown::{MarkdownAdapter, MarkdownFactory};
pub use python::{PythonAdapter, PythonFactory};
pub use sass::{SassAdapter, SassFactory};
pub use shorthand::{ShorthandAdapter, ShorthandFactory};
pub use typescript::{TypeScriptAdapter, TypeScriptFactory};

use crate::adapter::{AdapterFactory, AdapterMeta};
use crate::error::{AdapterError, CompileError, FormatError};
use crate::script::LexError;
use std::sync::Arc;

/// Every built-in dialect, in registry order
pub fn builtin() -> Vec<Arc<dyn AdapterFactory>> {
    vec![
        Arc::new(HtmlFactory),
        Arc::new(MarkdownFactory),
        Arc::new(ShorthandFactory::pug()),
        Arc::new(ShorthandFactory::slim()),
        Arc::new(CssFactory),
        Arc::new(SassFactory::sass()),
        Arc::new(SassFactory::scss()),
        Arc::new(JavaScriptFactory),
        Arc::new(TypeScriptFactory),
        Arc::new(JsxFactory::jsx()),
        Arc::new(JsxFactory::tsx()),
        Arc::new(PythonFactory),
    ]
}

pub(crate) fn compile_error(meta: &AdapterMeta, filename: &str, src: &str, err: LexError) -> AdapterError {
    CompileError::new(meta.id, filename, err.message)
        .at_offset(src, err.offset)
        .into()
}

pub(crate) fn format_error(meta: &AdapterMeta, filename: &str, src: &str, message: String, offset: usize) -> AdapterError {
    FormatError::new(meta.id, filename, message)
        .at_offset(src, offset)
        .into()
}

/// Trailing whitespace trimmed from every line, exactly one final newline
pub(crate) fn tidy_lines(content: &str) -> String {
    let mut out: String = content
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end_matches('\n')
        .to_string();
    out.push('\n');
    out
}
