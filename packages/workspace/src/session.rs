//! Live sync session: one project, many editor clients
//!
//! The session owns the authoritative `FileMap` and `ProjectConfig`. Client
//! messages and file-watcher batches are the only inputs; every output goes
//! through one broadcast channel of [`Envelope`]s that each connection
//! filters by [`Audience`].
//!
//! Disk writes are fire-and-forget. A file written by the session is
//! `pending-echo` for a short window so the watcher's notification for that
//! write is not mistaken for an external edit; a failed write leaves the
//! file `dirty`.

use crate::debounce::Debouncer;
use crate::echo::{EchoSuppressor, FileState};
use crate::error::{SessionError, SessionResult};
use crate::protocol::{display_root, ClientMessage, ServerMessage, ToastError};
use crate::templates::TemplateProvider;
use crate::watcher::FileWatcher;
use pen_adapters::{merge_settings, Adapter, AdapterMetadata, RegistryError};
use pen_common::{is_project_relative, load_file_map, FileMap, FileSystem, ProjectConfig, Settings, CONFIG_FILENAME};
use pen_compiler::pipeline::editor_settings;
use pen_compiler::{Pipeline, RenderOptions};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub type ClientId = u64;

/// Which connections a message is delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    Only(ClientId),
    Except(ClientId),
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub audience: Audience,
    pub message: ServerMessage,
}

impl Envelope {
    pub fn is_for(&self, client: ClientId) -> bool {
        match self.audience {
            Audience::All => true,
            Audience::Only(id) => id == client,
            Audience::Except(id) => id != client,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How long a session write suppresses the watcher's notification
    pub echo_window: Duration,
    /// Inject the devtools bridge into previews
    pub dev: bool,
    pub channel_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            echo_window: Duration::from_millis(1000),
            dev: true,
            channel_capacity: 256,
        }
    }
}

struct SessionState {
    config: ProjectConfig,
    files: FileMap,
    echo: EchoSuppressor,
    dirty: BTreeSet<String>,
    last_preview: Option<String>,
}

struct Inner {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    pipeline: Pipeline,
    options: SessionOptions,
    templates: RwLock<Option<Arc<dyn TemplateProvider>>>,
    state: Mutex<SessionState>,
    rendering: AtomicBool,
    next_client: AtomicU64,
    events: broadcast::Sender<Envelope>,
    writes: StdMutex<Vec<JoinHandle<()>>>,
}

/// Cheap to clone; all clones share one session
#[derive(Clone)]
pub struct SyncSession {
    inner: Arc<Inner>,
}

struct RenderGuard<'a>(&'a AtomicBool);

impl Drop for RenderGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncSession {
    pub fn new(
        root: impl Into<PathBuf>,
        config: ProjectConfig,
        files: FileMap,
        fs: Arc<dyn FileSystem>,
        pipeline: Pipeline,
        options: SessionOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(options.channel_capacity.max(1));
        let state = SessionState {
            config,
            files,
            echo: EchoSuppressor::new(options.echo_window),
            dirty: BTreeSet::new(),
            last_preview: None,
        };
        Self {
            inner: Arc::new(Inner {
                root: root.into(),
                fs,
                pipeline,
                options,
                templates: RwLock::new(None),
                state: Mutex::new(state),
                rendering: AtomicBool::new(false),
                next_client: AtomicU64::new(1),
                events,
                writes: StdMutex::new(Vec::new()),
            }),
        }
    }

    /// Load `.pen.config.json` and the editors' files from `root`
    pub fn open(
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        pipeline: Pipeline,
        options: SessionOptions,
    ) -> SessionResult<Self> {
        let root = root.into();
        let config = ProjectConfig::load(fs.as_ref(), &root)?;
        let files = load_file_map(fs.as_ref(), &root, &config);
        info!(root = %root.display(), editors = config.editors.len(), files = files.len(), "Opened project");
        Ok(Self::new(root, config, files, fs, pipeline, options))
    }

    pub fn set_templates(&self, provider: Arc<dyn TemplateProvider>) {
        *self.inner.templates.write().unwrap_or_else(PoisonError::into_inner) = Some(provider);
    }

    pub fn templates(&self) -> Option<Arc<dyn TemplateProvider>> {
        self.inner
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.inner.events.subscribe()
    }

    /// Register a new client, returning its id and the `init` message
    pub async fn connect(&self) -> (ClientId, ServerMessage) {
        let client = self.inner.next_client.fetch_add(1, Ordering::Relaxed);
        (client, self.init_message().await)
    }

    pub async fn init_message(&self) -> ServerMessage {
        let st = self.inner.state.lock().await;
        ServerMessage::Init {
            config: st.config.clone(),
            root_path: display_root(&self.inner.root),
            files: st.files.clone(),
            adapters: self.adapters(),
        }
    }

    pub async fn config(&self) -> ProjectConfig {
        self.inner.state.lock().await.config.clone()
    }

    pub async fn files(&self) -> FileMap {
        self.inner.state.lock().await.files.clone()
    }

    /// Last successfully rendered document
    pub async fn last_preview(&self) -> Option<String> {
        self.inner.state.lock().await.last_preview.clone()
    }

    pub async fn file_state(&self, filename: &str) -> FileState {
        let st = self.inner.state.lock().await;
        if st.dirty.contains(filename) {
            FileState::Dirty
        } else if st.echo.is_pending(filename) {
            FileState::PendingEcho
        } else {
            FileState::Clean
        }
    }

    pub fn adapters(&self) -> Vec<AdapterMetadata> {
        self.inner.pipeline.registry().all_metadata()
    }

    /// Wait for every disk write started so far
    pub async fn flush_writes(&self) {
        let pending: Vec<_> = self
            .inner
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "Write task failed");
            }
        }
    }

    /// Parse and handle one raw socket message
    pub async fn handle_text(&self, client: ClientId, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(client, message).await,
            Err(e) => warn!(client, error = %e, "Ignoring malformed client message"),
        }
    }

    /// Apply one client message. Errors never close the connection: they
    /// are logged, and for format/minify/compile also broadcast as a toast.
    pub async fn handle(&self, client: ClientId, message: ClientMessage) {
        let kind = message.kind();
        let toast_file = match &message {
            ClientMessage::Format { filename }
            | ClientMessage::Minify { filename }
            | ClientMessage::Compile { filename, .. } => Some(filename.clone()),
            _ => None,
        };
        debug!(client, kind, "Client message");

        if let Err(e) = self.dispatch(client, message).await {
            warn!(client, kind, error = %e, "Client message failed");
            if let Some(filename) = toast_file {
                let toast = ToastError::from_error(Some(filename.as_str()), &e);
                self.send(Audience::All, ServerMessage::ToastError(toast));
            }
        }
    }

    async fn dispatch(&self, client: ClientId, message: ClientMessage) -> SessionResult<()> {
        match message {
            ClientMessage::Update { filename, content } => {
                self.write_file(&filename, content.clone()).await?;
                self.send(Audience::Only(client), ServerMessage::UpdateAck {
                    filename: filename.clone(),
                });
                self.send(Audience::Except(client), ServerMessage::Update { filename, content });
                self.auto_render().await;
            }
            ClientMessage::Rename {
                old_filename,
                new_filename,
                new_type,
            } => self.rename(&old_filename, &new_filename, &new_type).await?,
            ClientMessage::Delete { filename } => self.delete(&filename).await?,
            ClientMessage::EditorSettings { filename, settings } => {
                self.update_settings(client, &filename, &settings).await?
            }
            ClientMessage::Format { filename } => {
                let output = self.with_adapter(&filename, |adapter, content| adapter.beautify(&filename, content)).await?;
                self.replace_content(&filename, output).await?;
            }
            ClientMessage::Minify { filename } => {
                let output = self.with_adapter(&filename, |adapter, content| adapter.minify(&filename, content)).await?;
                self.replace_content(&filename, output).await?;
            }
            ClientMessage::Compile { filename, target } => {
                let output = self
                    .with_adapter(&filename, |adapter, content| adapter.compile_to(&filename, &target, content))
                    .await?;
                self.replace_content(&filename, output.code).await?;
            }
            ClientMessage::Save { files } => self.save_all(client, files).await,
            ClientMessage::Render => {
                self.render().await;
            }
            ClientMessage::StartTemplate { template_id } => self.start_template(&template_id).await?,
            ClientMessage::SaveConfig { config } => self.save_config(&config).await?,
        }
        Ok(())
    }

    /// Put `content` in the file map and start writing it to disk
    async fn write_file(&self, filename: &str, content: String) -> SessionResult<()> {
        validate_filename(filename)?;
        {
            let mut st = self.inner.state.lock().await;
            st.files.insert(filename.to_string(), content.clone());
            st.echo.mark(filename);
        }
        self.persist(filename.to_string(), content);
        Ok(())
    }

    fn persist(&self, filename: String, content: String) {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let fs = inner.fs.clone();
            let path = inner.root.join(&filename);
            let result = tokio::task::spawn_blocking(move || fs.write(&path, &content)).await;

            let mut st = inner.state.lock().await;
            match result {
                Ok(Ok(())) => {
                    // the watcher fires after the write lands, so the window starts now
                    st.echo.mark(&filename);
                    st.dirty.remove(&filename);
                    debug!(file = %filename, "Wrote file");
                }
                Ok(Err(e)) => {
                    warn!(file = %filename, error = %e, "Write failed, file left dirty");
                    st.echo.forget(&filename);
                    st.dirty.insert(filename);
                }
                Err(e) => {
                    warn!(file = %filename, error = %e, "Write task aborted, file left dirty");
                    st.echo.forget(&filename);
                    st.dirty.insert(filename);
                }
            }
        });

        let mut writes = self.inner.writes.lock().unwrap_or_else(PoisonError::into_inner);
        writes.retain(|h| !h.is_finished());
        writes.push(handle);
    }

    /// Formatter/minifier/compiler output replaces the file like an update
    async fn replace_content(&self, filename: &str, output: String) -> SessionResult<()> {
        let unchanged = self.inner.state.lock().await.files.get(filename) == Some(&output);
        if unchanged {
            debug!(file = %filename, "Output identical to input, nothing to do");
            return Ok(());
        }
        self.write_file(filename, output.clone()).await?;
        self.send(Audience::All, ServerMessage::Update {
            filename: filename.to_string(),
            content: output,
        });
        self.auto_render().await;
        Ok(())
    }

    /// Run `op` with the adapter of `filename`'s editor and its current content
    async fn with_adapter<T>(
        &self,
        filename: &str,
        op: impl FnOnce(&dyn Adapter, &str) -> Result<T, pen_adapters::AdapterError>,
    ) -> SessionResult<T> {
        let (adapter, content) = {
            let st = self.inner.state.lock().await;
            let entry = st
                .config
                .editor(filename)
                .ok_or_else(|| SessionError::UnknownFile(filename.to_string()))?;
            let factory = self.inner.pipeline.registry().get(&entry.adapter)?;
            let settings = editor_settings(entry, &st.config);
            let adapter = factory.instantiate(&settings, self.inner.pipeline.context());
            (adapter, st.files.get(filename).cloned().unwrap_or_default())
        };
        Ok(op(adapter.as_ref(), &content)?)
    }

    async fn rename(&self, old: &str, new: &str, new_type: &str) -> SessionResult<()> {
        validate_filename(old)?;
        validate_filename(new)?;
        if !self.inner.pipeline.registry().contains(new_type) {
            return Err(RegistryError::UnknownAdapter(new_type.to_string()).into());
        }

        let sync = {
            let mut st = self.inner.state.lock().await;
            if st.config.editor(old).is_none() {
                return Err(SessionError::UnknownFile(old.to_string()));
            }
            if old != new && st.config.editor(new).is_some() {
                return Err(SessionError::InvalidPath(format!("{new} already exists")));
            }

            if old != new {
                let from = self.inner.root.join(old);
                if self.inner.fs.exists(&from) {
                    st.echo.mark(old);
                    st.echo.mark(new);
                    if let Err(e) = self.inner.fs.rename(&from, &self.inner.root.join(new)) {
                        warn!(from = %old, to = %new, error = %e, "Rename on disk failed");
                    }
                }
                if let Some(content) = st.files.remove(old) {
                    st.files.insert(new.to_string(), content);
                }
                if st.dirty.remove(old) {
                    st.dirty.insert(new.to_string());
                }
            }

            if let Some(entry) = st.config.editor_mut(old) {
                entry.filename = new.to_string();
                entry.adapter = new_type.to_string();
            }
            self.save_project_config(&mut st);
            info!(from = %old, to = %new, adapter = %new_type, "Renamed editor");
            self.sync_message(&st)
        };

        self.send(Audience::All, sync);
        self.auto_render().await;
        Ok(())
    }

    async fn delete(&self, filename: &str) -> SessionResult<()> {
        validate_filename(filename)?;
        let sync = {
            let mut st = self.inner.state.lock().await;
            let had_editor = st.config.editor(filename).is_some();
            let had_file = st.files.remove(filename).is_some();
            if !had_editor && !had_file {
                return Err(SessionError::UnknownFile(filename.to_string()));
            }
            st.config.editors.retain(|e| e.filename != filename);
            st.dirty.remove(filename);

            let path = self.inner.root.join(filename);
            if self.inner.fs.exists(&path) {
                st.echo.mark(filename);
                if let Err(e) = self.inner.fs.remove(&path) {
                    warn!(file = %filename, error = %e, "Delete on disk failed");
                }
            }
            self.save_project_config(&mut st);
            info!(file = %filename, "Deleted editor");
            self.sync_message(&st)
        };

        self.send(Audience::All, sync);
        self.auto_render().await;
        Ok(())
    }

    async fn update_settings(&self, client: ClientId, filename: &str, settings: &Settings) -> SessionResult<()> {
        let sync = {
            let mut st = self.inner.state.lock().await;
            let entry = st
                .config
                .editor_mut(filename)
                .ok_or_else(|| SessionError::UnknownFile(filename.to_string()))?;
            merge_settings(&mut entry.settings, settings);
            self.save_project_config(&mut st);
            self.sync_message(&st)
        };

        self.send(Audience::Except(client), sync);
        self.auto_render().await;
        Ok(())
    }

    /// Bulk update; a bad filename or failed write skips that file only
    async fn save_all(&self, client: ClientId, files: FileMap) {
        let mut saved = 0;
        for (filename, content) in files {
            match self.write_file(&filename, content.clone()).await {
                Ok(()) => {
                    saved += 1;
                    self.send(Audience::Except(client), ServerMessage::Update { filename, content });
                }
                Err(e) => warn!(file = %filename, error = %e, "Skipping file in bulk save"),
            }
        }
        info!(files = saved, "Saved files");
        if saved > 0 {
            self.auto_render().await;
        }
    }

    async fn start_template(&self, template_id: &str) -> SessionResult<()> {
        let provider = self.templates().ok_or(SessionError::NoTemplates)?;
        let template = provider.load(template_id)?;

        let reload = {
            let mut st = self.inner.state.lock().await;
            let mut config = template.config;
            config.name = st.config.name.clone();

            let old_files: Vec<String> = st.files.keys().cloned().collect();
            for filename in old_files {
                if template.files.contains_key(&filename) {
                    continue;
                }
                let path = self.inner.root.join(&filename);
                if self.inner.fs.exists(&path) {
                    st.echo.mark(&filename);
                    if let Err(e) = self.inner.fs.remove(&path) {
                        warn!(file = %filename, error = %e, "Could not remove old file");
                    }
                }
            }

            let mut files = FileMap::new();
            st.dirty.clear();
            for (filename, content) in template.files {
                if let Err(e) = validate_filename(&filename) {
                    warn!(file = %filename, error = %e, "Skipping template file");
                    continue;
                }
                st.echo.mark(&filename);
                if let Err(e) = self.inner.fs.write(&self.inner.root.join(&filename), &content) {
                    warn!(file = %filename, error = %e, "Template file write failed");
                    st.dirty.insert(filename.clone());
                }
                files.insert(filename, content);
            }

            st.config = config;
            st.files = files;
            self.save_project_config(&mut st);
            info!(template = %template_id, "Project reset to template");

            ServerMessage::Reload {
                config: st.config.clone(),
                root_path: display_root(&self.inner.root),
                files: st.files.clone(),
                adapters: self.adapters(),
            }
        };

        self.send(Audience::All, reload);
        self.auto_render().await;
        Ok(())
    }

    async fn save_config(&self, patch: &serde_json::Value) -> SessionResult<()> {
        let sync = {
            let mut st = self.inner.state.lock().await;
            let mut next = st.config.clone();
            next.merge_json(patch)?;
            for editor in &next.editors {
                validate_filename(&editor.filename)?;
            }

            for editor in &next.editors {
                if st.files.contains_key(&editor.filename) {
                    continue;
                }
                if let Ok(content) = self.inner.fs.read_to_string(&self.inner.root.join(&editor.filename)) {
                    st.files.insert(editor.filename.clone(), content);
                }
            }
            st.config = next;
            self.save_project_config(&mut st);
            info!("Config saved");
            self.sync_message(&st)
        };

        self.send(Audience::All, sync);
        self.auto_render().await;
        Ok(())
    }

    fn save_project_config(&self, st: &mut SessionState) {
        st.echo.mark(CONFIG_FILENAME);
        if let Err(e) = st.config.save(self.inner.fs.as_ref(), &self.inner.root) {
            warn!(error = %e, "Failed to write project config");
        }
    }

    fn sync_message(&self, st: &SessionState) -> ServerMessage {
        ServerMessage::SyncEditors {
            config: st.config.clone(),
            files: st.files.clone(),
            adapters: self.adapters(),
        }
    }

    /// Apply a debounced batch of watcher notifications
    pub async fn on_external_changes(&self, filenames: BTreeSet<String>) {
        let mut changed = false;
        for filename in filenames {
            let content = {
                let mut st = self.inner.state.lock().await;
                let tracked = st.files.contains_key(&filename) || st.config.editor(&filename).is_some();
                if !tracked {
                    debug!(file = %filename, "Ignoring change to untracked file");
                    continue;
                }
                if st.echo.is_echo(&filename) {
                    debug!(file = %filename, "Suppressed echo of our own write");
                    continue;
                }

                let content = match self.inner.fs.read_to_string(&self.inner.root.join(&filename)) {
                    Ok(content) => content,
                    Err(e) => {
                        warn!(file = %filename, error = %e, "Could not read changed file");
                        continue;
                    }
                };
                if st.dirty.remove(&filename) {
                    warn!(file = %filename, "External edit replaces unsaved session content");
                }
                let previous = st.files.insert(filename.clone(), content.clone());
                changed |= previous.as_ref() != Some(&content);
                content
            };

            info!(file = %filename, "External change");
            self.send(Audience::All, ServerMessage::ExternalUpdate { filename, content });
        }

        if changed {
            self.auto_render().await;
        }
    }

    /// Watch the project root and feed debounced batches into the session
    pub fn watch(&self, debounce: Duration) -> SessionResult<JoinHandle<()>> {
        let (tx, mut rx) = mpsc::channel(256);
        let watcher = FileWatcher::new(self.inner.root.clone(), tx)?;
        let session = self.clone();

        Ok(tokio::spawn(async move {
            let _watcher = watcher;
            let debouncer = Debouncer::new(debounce);
            while let Some(batch) = debouncer.next_batch(&mut rx).await {
                session.on_external_changes(batch).await;
            }
        }))
    }

    async fn auto_render(&self) {
        let auto_run = self.inner.state.lock().await.config.auto_run;
        if auto_run {
            self.render().await;
        } else {
            debug!("autoRun is off, skipping render");
        }
    }

    /// Render the current project and broadcast a `preview`. A request that
    /// arrives while a render is in flight is dropped. Returns whether a
    /// preview was produced.
    pub async fn render(&self) -> bool {
        if self.inner.rendering.swap(true, Ordering::AcqRel) {
            debug!("Render already in flight, dropping request");
            return false;
        }
        let _guard = RenderGuard(&self.inner.rendering);

        let (files, config) = {
            let st = self.inner.state.lock().await;
            (st.files.clone(), st.config.clone())
        };
        let options = RenderOptions {
            dev: self.inner.options.dev,
        };

        match self.inner.pipeline.render(&files, &config, &options) {
            Ok(html) => {
                self.inner.state.lock().await.last_preview = Some(html.clone());
                self.send(Audience::All, ServerMessage::Preview {
                    html,
                    timestamp: chrono::Utc::now().timestamp_millis(),
                });
                true
            }
            Err(e) => {
                warn!(error = %e, "Render failed, keeping previous preview");
                let toast = ToastError::from_error(None, &SessionError::Render(e));
                self.send(Audience::All, ServerMessage::ToastError(toast));
                false
            }
        }
    }

    fn send(&self, audience: Audience, message: ServerMessage) {
        let kind = message.kind();
        if self.inner.events.send(Envelope { audience, message }).is_err() {
            debug!(kind, "No clients connected");
        }
    }
}

/// Project-relative path that stays inside the root and is not the
/// project file itself
pub fn validate_filename(filename: &str) -> SessionResult<()> {
    if !is_project_relative(filename) || filename == CONFIG_FILENAME {
        return Err(SessionError::InvalidPath(filename.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("index.html").is_ok());
        assert!(validate_filename("src/app.ts").is_ok());
        assert!(validate_filename("").is_err());
        assert!(validate_filename("../secret").is_err());
        assert!(validate_filename("/etc/passwd").is_err());
        assert!(validate_filename("a/../../b").is_err());
        assert!(validate_filename(CONFIG_FILENAME).is_err());
    }

    #[test]
    fn test_audience() {
        let only = Envelope {
            audience: Audience::Only(2),
            message: ServerMessage::UpdateAck { filename: "a".into() },
        };
        assert!(only.is_for(2));
        assert!(!only.is_for(3));

        let except = Envelope {
            audience: Audience::Except(2),
            ..only
        };
        assert!(!except.is_for(2));
        assert!(except.is_for(3));
    }
}
