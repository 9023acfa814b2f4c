//! Live sync between editor clients, the project on disk and the preview
//!
//! A [`SyncSession`] keeps the authoritative file map for one project,
//! mirrors client edits to disk, applies external edits picked up by the
//! [`FileWatcher`] and re-renders the preview after every change.

pub mod debounce;
pub mod echo;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod templates;
pub mod watcher;

pub use debounce::Debouncer;
pub use echo::{EchoSuppressor, FileState};
pub use error::{SessionError, SessionResult};
pub use protocol::{ClientMessage, ServerMessage, ToastError};
pub use server::{router, run, serve, ServerOptions};
pub use session::{Audience, ClientId, Envelope, SessionOptions, SyncSession};
pub use templates::{DirTemplateProvider, ProjectTemplate, TemplateProvider, TemplateSummary};
pub use watcher::FileWatcher;
