use crate::config::ProjectConfig;
use crate::filesystem::FileSystem;
use std::collections::BTreeMap;
use std::path::{Component, Path};

/// filename → current text content; the authoritative in-memory project state
pub type FileMap = BTreeMap<String, String>;

/// Whether `filename` is a plain relative path that stays inside the root
pub fn is_project_relative(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains('\\')
        && Path::new(filename)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

/// Read every editor's file from the project root.
///
/// Missing or unreadable files are skipped; the editor then renders as empty.
pub fn load_file_map(fs: &dyn FileSystem, root: &Path, config: &ProjectConfig) -> FileMap {
    let mut files = FileMap::new();
    for editor in &config.editors {
        if !is_project_relative(&editor.filename) {
            tracing::warn!(file = %editor.filename, "Skipping editor file outside the project");
            continue;
        }
        let path = root.join(&editor.filename);
        match fs.read_to_string(&path) {
            Ok(content) => {
                files.insert(editor.filename.clone(), content);
            }
            Err(e) => {
                tracing::debug!(file = %editor.filename, error = %e, "Skipping unreadable editor file");
            }
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorEntry;
    use crate::filesystem::MockFileSystem;

    #[test]
    fn test_load_file_map_skips_missing() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/index.html", "<p>hi</p>");

        let mut config = ProjectConfig::default_named("p");
        config.editors.push(EditorEntry::new("html", "index.html"));
        config.editors.push(EditorEntry::new("css", "style.css"));

        let files = load_file_map(&fs, Path::new("/p"), &config);
        assert_eq!(files.len(), 1);
        assert_eq!(files["index.html"], "<p>hi</p>");
    }

    #[test]
    fn test_project_relative_paths() {
        assert!(is_project_relative("index.html"));
        assert!(is_project_relative("src/app.ts"));
        assert!(!is_project_relative(""));
        assert!(!is_project_relative("../secret"));
        assert!(!is_project_relative("a/../../b"));
        assert!(!is_project_relative("/etc/passwd"));
        assert!(!is_project_relative("./index.html"));
        assert!(!is_project_relative("src\\app.ts"));
    }

    #[test]
    fn test_load_file_map_stays_inside_root() {
        let fs = MockFileSystem::new();
        fs.add_file("/secret", "TOP-SECRET");
        fs.add_file("/p/index.html", "<p>hi</p>");

        let mut config = ProjectConfig::default_named("p");
        config.editors.push(EditorEntry::new("html", "index.html"));
        config.editors.push(EditorEntry::new("markdown", "../secret"));

        let files = load_file_map(&fs, Path::new("/p"), &config);
        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["index.html"]);
    }
}
