use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use pen_common::{load_file_map, FileSystem, ProjectConfig, RealFileSystem};
use pen_compiler::bundle::BUNDLE_FILE;
use pen_compiler::{bundle_scripts, Pipeline, RenderError, RenderOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Write the document to a file instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Also write a source-mapped bundle of the script editors
    #[arg(long)]
    pub bundle: bool,

    /// Inject the devtools bridge
    #[arg(long)]
    pub dev: bool,
}

pub fn render(args: RenderArgs) -> Result<()> {
    let fs = RealFileSystem;
    let config = ProjectConfig::load(&fs, &args.path)
        .with_context(|| format!("Cannot open project in {}", args.path.display()))?;
    let files = load_file_map(&fs, &args.path, &config);

    let pipeline = Pipeline::with_defaults();
    let html = pipeline
        .render(&files, &config, &RenderOptions { dev: args.dev })
        .map_err(describe)?;

    match &args.out {
        Some(out) => {
            fs.write(out, &html)?;
            eprintln!("  {} {} → {}", "✓".green(), config.name, out.display());
        }
        None => print!("{html}"),
    }

    if args.bundle {
        let bundle = bundle_scripts(&pipeline, &files, &config).map_err(describe)?;
        let dir = args
            .out
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(args.path.as_path());
        let code_path = dir.join(BUNDLE_FILE);
        fs.write(&code_path, &bundle.code)?;
        fs.write(&dir.join(format!("{BUNDLE_FILE}.map")), &bundle.map)?;
        eprintln!("  {} bundle → {}", "✓".green(), code_path.display());
    }

    Ok(())
}

/// Compile errors carry their location in the message
fn describe(err: RenderError) -> anyhow::Error {
    match err.compile_error() {
        Some(e) => match (e.line, e.column) {
            (Some(line), Some(column)) => anyhow!("{}:{}:{}: {}", e.filename, line, column, e.message),
            _ => anyhow!("{}: {}", e.filename, e.message),
        },
        None => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project(dir: &Path, script: &str) {
        fs::write(
            dir.join(".pen.config.json"),
            r#"{
  "name": "Cli",
  "editors": [
    { "type": "html", "filename": "index.html" },
    { "type": "javascript", "filename": "main.js" }
  ]
}"#,
        )
        .unwrap();
        fs::write(dir.join("index.html"), "<p>cli</p>").unwrap();
        fs::write(dir.join("main.js"), script).unwrap();
    }

    #[test]
    fn test_render_to_file_with_bundle() {
        let dir = tempfile::tempdir().unwrap();
        project(dir.path(), "console.log(1);\n");
        let out = dir.path().join("dist.html");

        render(RenderArgs {
            path: dir.path().to_path_buf(),
            out: Some(out.clone()),
            bundle: true,
            dev: false,
        })
        .unwrap();

        let html = fs::read_to_string(out).unwrap();
        assert!(html.contains("<title>Cli</title>"));
        assert!(html.contains("<p>cli</p>"));
        assert!(fs::read_to_string(dir.path().join("bundle.js")).unwrap().starts_with("// main.js\n"));
        assert!(dir.path().join("bundle.js.map").exists());
    }

    #[test]
    fn test_compile_error_reports_location() {
        let dir = tempfile::tempdir().unwrap();
        project(dir.path(), "function f() {\n  return 1);\n}");

        let err = render(RenderArgs {
            path: dir.path().to_path_buf(),
            out: Some(dir.path().join("dist.html")),
            bundle: false,
            dev: false,
        })
        .unwrap_err();
        assert!(err.to_string().starts_with("main.js:2:"));
    }
}
