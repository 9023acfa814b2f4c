//! Pen dialect adapters
//!
//! Each dialect is an [`AdapterFactory`] registered in an [`AdapterRegistry`].
//! The pipeline instantiates one [`Adapter`] per editor with that editor's
//! settings merged over the dialect defaults.

pub mod adapter;
pub mod cache;
pub mod dialects;
pub mod error;
pub mod registry;
pub mod script;
pub mod style;

pub use adapter::*;
pub use cache::CompilerCache;
pub use error::*;
pub use registry::{AdapterMetadata, AdapterRegistry};
