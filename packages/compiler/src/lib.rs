//! Pen render pipeline
//!
//! Composes a project's editors into one self-contained HTML document:
//! editors are ordered markup → style → script, each is rendered by its
//! adapter, and the resulting fragments are merged into an
//! [`OutputDocument`]. Bare imports in scripts are rewritten to CDN URLs.

pub mod bundle;
pub mod cdn;
pub mod document;
pub mod error;
pub mod pipeline;

pub use bundle::{bundle_scripts, ScriptBundle};
pub use cdn::{CdnTransformer, BUILTIN_OVERRIDES, FALLBACK_CDN};
pub use document::{Node, OutputDocument};
pub use error::{RenderError, RenderResult};
pub use pipeline::{Pipeline, RenderOptions};
