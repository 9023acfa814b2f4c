use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use pen_adapters::{AdapterRegistry, AdapterType, TemplateVars};
use pen_common::{EditorEntry, FileMap, FileSystem, ProjectConfig, RealFileSystem, CONFIG_FILENAME};
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Project directory (created if missing)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Project name (defaults to the directory name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Dialects to create editors for
    #[arg(short, long, value_delimiter = ',', default_value = "html,css,javascript")]
    pub editors: Vec<String>,

    /// Overwrite an existing project
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs) -> Result<()> {
    let config_path = args.path.join(CONFIG_FILENAME);
    if config_path.exists() && !args.force {
        println!("{} {} already exists", "⚠️".yellow(), config_path.display().to_string().bright_white());
        println!("Use --force to overwrite");
        return Ok(());
    }

    let name = args.name.clone().unwrap_or_else(|| project_name(&args.path));
    let (config, files) = scaffold(&AdapterRegistry::with_defaults(), &name, &args.editors)?;

    println!("{}", format!("📝 Initializing {name}...").bright_blue().bold());

    let fs = RealFileSystem;
    for (filename, content) in &files {
        let path = args.path.join(filename);
        if fs.exists(&path) && !args.force {
            println!("  {} Kept existing {}", "·".dimmed(), filename);
            continue;
        }
        fs.write(&path, content)?;
        println!("  {} Created {}", "✓".green(), filename);
    }
    config.save(&fs, &args.path)?;
    println!("  {} Created {}", "✓".green(), CONFIG_FILENAME);

    println!();
    println!("Run {} to start editing", format!("pen serve {}", args.path.display()).bright_white());
    Ok(())
}

/// Project file and starter files for the given dialects
pub fn scaffold(registry: &AdapterRegistry, name: &str, adapters: &[String]) -> Result<(ProjectConfig, FileMap)> {
    let mut vars = TemplateVars::new();
    vars.insert("projectName".to_string(), name.to_string());

    let mut config = ProjectConfig::default_named(name);
    let mut files = FileMap::new();
    for id in adapters {
        let factory = registry.get(id.trim())?;
        let meta = factory.meta();
        let stem = match meta.adapter_type {
            AdapterType::Markup => "index",
            AdapterType::Style => "style",
            AdapterType::Script | AdapterType::Other => "main",
        };
        let filename = format!("{stem}{}", meta.file_extension);
        if config.editor(&filename).is_some() {
            bail!("{} is listed twice", meta.id);
        }
        config.editors.push(EditorEntry::new(meta.id, filename.as_str()));
        files.insert(filename, factory.default_template(&vars));
    }
    config.validate()?;
    Ok((config, files))
}

fn project_name(path: &Path) -> String {
    path.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "Untitled".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scaffold_names_files_by_slot() {
        let registry = AdapterRegistry::with_defaults();
        let (config, files) = scaffold(&registry, "Demo", &ids(&["markdown", "scss", "typescript"])).unwrap();

        let names: Vec<_> = config.editors.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["index.md", "style.scss", "main.ts"]);
        assert_eq!(files.len(), 3);
        assert!(!files.values().any(|t| t.contains("{projectName}")));
    }

    #[test]
    fn test_scaffold_rejects_unknown_and_duplicate() {
        let registry = AdapterRegistry::with_defaults();
        assert!(scaffold(&registry, "Demo", &ids(&["cobol"])).is_err());
        assert!(scaffold(&registry, "Demo", &ids(&["css", "css"])).is_err());
    }

    #[test]
    fn test_init_writes_a_loadable_project() {
        let dir = tempfile::tempdir().unwrap();
        init(InitArgs {
            path: dir.path().to_path_buf(),
            name: Some("Demo".into()),
            editors: ids(&["html", "css", "javascript"]),
            force: false,
        })
        .unwrap();

        let config = ProjectConfig::load(&RealFileSystem, dir.path()).unwrap();
        assert_eq!(config.name, "Demo");
        assert_eq!(config.editors.len(), 3);
        assert!(dir.path().join("index.html").exists());
        assert!(dir.path().join("main.js").exists());
    }
}
