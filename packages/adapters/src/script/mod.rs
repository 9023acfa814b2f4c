//! Script tooling shared by the JavaScript family of dialects

mod format;
mod jsx;
mod lexer;
mod minify;
mod typescript;

pub use format::format_js;
pub use jsx::{transform_jsx, JsxOptions};
pub use lexer::{check_balanced, significant, tokenize, LexError, Token, TokenKind, Tokenizer};
pub use minify::minify_js;
pub use typescript::strip_types;
