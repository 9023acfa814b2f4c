use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use pen_common::CONFIG_FILENAME;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::error::SessionResult;

/// Watches a project root and forwards changed project-relative filenames
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    pub fn new(root: PathBuf, tx: mpsc::Sender<String>) -> SessionResult<Self> {
        let base = root.canonicalize().unwrap_or_else(|_| root.clone());
        let watch_base = base.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for filename in changed_files(&watch_base, &event) {
                        // the receiver only closes on shutdown
                        let _ = tx.blocking_send(filename);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "File watch error"),
            },
            Config::default(),
        )?;

        watcher.watch(&base, RecursiveMode::Recursive)?;
        tracing::info!(root = %base.display(), "Watching project");

        Ok(Self {
            _watcher: watcher,
            root: base,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Project-relative names of the files a notification is about
pub fn changed_files(root: &Path, event: &Event) -> Vec<String> {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter_map(|path| relative_name(root, path))
        .collect()
}

fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let name = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    let hidden = relative
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'));
    if name.is_empty() || hidden || name == CONFIG_FILENAME {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_relative_names() {
        let root = Path::new("/p");
        let changed = changed_files(
            root,
            &event(
                EventKind::Modify(ModifyKind::Any),
                &["/p/index.html", "/p/src/app.ts", "/p/.pen.config.json", "/p/.git/HEAD", "/q/x.js"],
            ),
        );
        assert_eq!(changed, vec!["index.html", "src/app.ts"]);
    }

    #[test]
    fn test_only_content_events() {
        let root = Path::new("/p");
        assert!(changed_files(root, &event(EventKind::Remove(RemoveKind::File), &["/p/a.js"])).is_empty());
        assert_eq!(
            changed_files(root, &event(EventKind::Create(CreateKind::File), &["/p/a.js"])),
            vec!["a.js"]
        );
    }

    #[tokio::test]
    async fn test_file_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let _watcher = FileWatcher::new(dir.path().to_path_buf(), tx).unwrap();

        let path = dir.path().join("main.js");
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        std::fs::write(&path, "let a = 1;").unwrap();

        let name = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("main.js"));
    }
}
