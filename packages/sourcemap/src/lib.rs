//! Source map support for composed Pen output
//!
//! Wraps the `sourcemap` crate with an append-only builder that stitches
//! glue code, identity-mapped sources and maps from nested compilers into
//! one generated file.

pub mod builder;
pub mod error;
pub mod utils;

pub use builder::{json_to_data_url, map_to_json, SourceMapBuilder};
pub use error::{SourceMapError, SourceMapResult};
pub use utils::{byte_offset_to_line_col, count_lines, offset_to_position};
