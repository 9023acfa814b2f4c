//! Shared project model for Pen: the project file, the file map and the
//! storage seam used to mirror both to disk.

pub mod config;
pub mod error;
pub mod files;
pub mod filesystem;
pub mod result;

pub use config::*;
pub use error::*;
pub use files::*;
pub use filesystem::*;
pub use result::*;
