//! End-to-end render tests over the built-in dialects

use pen_common::{load_file_map, EditorEntry, FileMap, ProjectConfig, RealFileSystem};
use pen_compiler::{bundle_scripts, Pipeline, RenderError, RenderOptions};
use std::fs;

fn project(editors: &[(&str, &str, &str)]) -> (ProjectConfig, FileMap) {
    let mut config = ProjectConfig::default_named("Demo");
    let mut files = FileMap::new();
    for (adapter, filename, content) in editors {
        config.editors.push(EditorEntry::new(*adapter, *filename));
        files.insert(filename.to_string(), content.to_string());
    }
    (config, files)
}

fn render(config: &ProjectConfig, files: &FileMap) -> String {
    Pipeline::with_defaults()
        .render(files, config, &RenderOptions::default())
        .unwrap()
}

#[test]
fn test_editors_render_markup_style_script() {
    let (config, files) = project(&[
        ("javascript", "main.js", "console.log('hi');"),
        ("css", "style.css", "body { color: red; }"),
        ("html", "index.html", "<h1>Hello</h1>"),
    ]);
    let html = render(&config, &files);

    assert!(html.starts_with("<!DOCTYPE html>\n<html lang=\"en\">"));
    assert!(html.contains("<title>Demo</title>"));

    let style = html.find("<style id=\"pen-style-css\" type=\"text/css\">").unwrap();
    let head_end = html.find("</head>").unwrap();
    let heading = html.find("<h1>Hello</h1>").unwrap();
    let body_end = html.find("</body>").unwrap();
    let script = html.find("<script id=\"pen-script-javascript\" type=\"module\">").unwrap();

    assert!(style < head_end);
    assert!(head_end < heading && heading < body_end);
    assert!(body_end < script);
    assert!(html.contains("body { color: red; }\n\n/*# sourceURL=style.css */"));
    assert!(html.contains("console.log('hi');\n\n//# sourceURL=main.js"));
}

#[test]
fn test_same_class_keeps_configured_order() {
    let (config, files) = project(&[
        ("typescript", "b.ts", "let b: number = 2;"),
        ("html", "index.html", ""),
        ("javascript", "a.js", "let a = 1;"),
    ]);
    let html = render(&config, &files);

    let ts = html.find("pen-script-typescript").unwrap();
    let js = html.find("pen-script-javascript").unwrap();
    assert!(ts < js);
    assert!(!html.contains("number"));
}

#[test]
fn test_render_is_deterministic() {
    let (config, files) = project(&[
        ("markdown", "README.md", "# Title"),
        ("scss", "style.scss", "$c: blue;\na { color: $c; }"),
        ("jsx", "app.jsx", "const el = <p>hi</p>;"),
    ]);
    assert_eq!(render(&config, &files), render(&config, &files));
}

#[test]
fn test_bare_imports_use_cdn_with_project_overrides() {
    let (mut config, files) = project(&[(
        "javascript",
        "main.js",
        "import { createApp } from 'vue';\nimport * as d3 from 'd3';\nimport _ from 'lodash';\nimport x from './x.js';",
    )]);
    config
        .import_overrides
        .insert("vue".into(), "https://example.test/vue.js".into());

    let html = render(&config, &files);
    assert!(html.contains("from 'https://example.test/vue.js'"));
    assert!(html.contains("from 'https://cdn.jsdelivr.net/npm/d3@7/+esm'"));
    assert!(html.contains("from 'https://esm.run/lodash'"));
    assert!(html.contains("from './x.js'"));
}

#[test]
fn test_python_keeps_script_type_and_loads_runtime_once() {
    let (mut config, files) = project(&[("python", "main.py", "import browser\n")]);
    config
        .global_resources
        .scripts
        .push("https://cdn.jsdelivr.net/npm/brython@3.12/brython.min.js".into());

    let html = render(&config, &files);
    assert!(html.contains("<script id=\"pen-script-python\" type=\"text/python\">import browser\n"));
    assert_eq!(html.matches("brython.min.js").count(), 1);
    assert!(html.contains("brython_stdlib.js"));
}

#[test]
fn test_classic_scripts_are_plain_javascript() {
    let (mut config, files) = project(&[("javascript", "main.js", "var a = 1;")]);
    config.editors[0]
        .settings
        .insert("moduleType".into(), "classic".into());

    let html = render(&config, &files);
    assert!(html.contains("<script id=\"pen-script-javascript\" type=\"text/javascript\">\"use strict\";var a = 1;"));
}

#[test]
fn test_full_document_markup_is_merged() {
    let page = "<!DOCTYPE html>\n<html lang=\"fr\">\n<head><meta name=\"x\" content=\"y\"></head>\n<body><main>Bonjour</main></body>\n</html>";
    let (config, files) = project(&[("html", "index.html", page), ("css", "style.css", "main {}")]);
    let html = render(&config, &files);

    assert_eq!(html.matches("<!DOCTYPE").count(), 1);
    assert_eq!(html.matches("<body").count(), 1);
    assert!(html.contains("<html lang=\"fr\">"));
    assert!(html.contains("<meta name=\"x\" content=\"y\">"));
    assert!(html.contains("<body>\n<main>Bonjour</main>\n</body>"));
    assert!(html.contains("pen-style-css"));
}

#[test]
fn test_compile_error_aborts_render() {
    let (config, files) = project(&[
        ("html", "index.html", "<p>ok</p>"),
        ("javascript", "main.js", "function f() {\n  return 1);\n}"),
    ]);
    let err = Pipeline::with_defaults()
        .render(&files, &config, &RenderOptions::default())
        .unwrap_err();

    let compile = err.compile_error().expect("compile error");
    assert_eq!(compile.filename, "main.js");
    assert_eq!(compile.adapter_id, "javascript");
    assert_eq!(compile.line, Some(2));
}

#[test]
fn test_style_compile_error_aborts_render() {
    let (config, files) = project(&[
        ("html", "index.html", "<p>ok</p>"),
        ("scss", "style.scss", "a {\n  color: $missing;\n}\n"),
    ]);
    let err = Pipeline::with_defaults()
        .render(&files, &config, &RenderOptions::default())
        .unwrap_err();

    let compile = err.compile_error().expect("compile error");
    assert_eq!(compile.adapter_id, "scss");
    assert_eq!(compile.filename, "style.scss");
    assert_eq!((compile.line, compile.column), (Some(2), Some(10)));
}

#[test]
fn test_unknown_adapter() {
    let (config, files) = project(&[("cobol", "main.cob", "")]);
    let err = Pipeline::with_defaults()
        .render(&files, &config, &RenderOptions::default())
        .unwrap_err();
    assert!(matches!(err, RenderError::Registry(_)));
}

#[test]
fn test_dev_bridge_injected_first_in_head() {
    let (config, files) = project(&[("html", "index.html", "<p></p>")]);
    let html = Pipeline::with_defaults()
        .render(&files, &config, &RenderOptions { dev: true })
        .unwrap();

    let bridge = html.find("<script id=\"pen-debug-bridge\" type=\"module\">").unwrap();
    assert!(bridge < html.find("</head>").unwrap());
    assert!(html.contains("chobitsu"));
    assert!(!render(&config, &files).contains("pen-debug-bridge"));
}

#[test]
fn test_render_from_project_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(".pen.config.json"),
        r#"{
  "name": "Disk",
  "editors": [
    { "type": "html", "filename": "index.html" },
    { "type": "css", "filename": "style.css", "settings": { "normalize": false } }
  ],
  "globalResources": { "scripts": [], "styles": ["https://fonts.test/a.css"] }
}"#,
    )
    .unwrap();
    fs::write(dir.path().join("index.html"), "<p>disk</p>").unwrap();

    let fs = RealFileSystem;
    let config = ProjectConfig::load(&fs, dir.path()).unwrap();
    let files = load_file_map(&fs, dir.path(), &config);
    let html = render(&config, &files);

    assert!(html.contains("<p>disk</p>"));
    assert!(html.contains("<link rel=\"stylesheet\" href=\"https://fonts.test/a.css\">"));
    assert!(!html.contains("normalize.css"));
    // missing style.css renders as an empty stylesheet
    assert!(html.contains("/*# sourceURL=style.css */"));
}

#[test]
fn test_bundle_maps_back_to_each_editor() {
    let (config, files) = project(&[
        ("javascript", "a.js", "const a = 1;\nconsole.log(a);\n"),
        ("typescript", "b.ts", "const b: string = 'x';\n"),
        ("python", "c.py", "print(1)\n"),
    ]);
    let bundle = bundle_scripts(&Pipeline::with_defaults(), &files, &config).unwrap();

    assert!(bundle.code.starts_with("// a.js\nconst a = 1;\n"));
    assert!(bundle.code.contains("// a.js\nconst a = 1;\nconsole.log(a);\n// b.ts\nconst b"));
    assert!(!bundle.code.contains("string"));
    assert!(!bundle.code.contains("print(1)"));
    assert!(bundle
        .code
        .trim_end()
        .lines()
        .last()
        .unwrap()
        .starts_with("//# sourceMappingURL=data:application/json;charset=utf-8;base64,"));

    let map = sourcemap::SourceMap::from_slice(bundle.map.as_bytes()).unwrap();
    let sources: Vec<_> = map.sources().collect();
    assert!(sources.contains(&"a.js"));
    assert!(sources.contains(&"b.ts"));

    // 0-based generated line 4 holds the body of b.ts
    let token = map.lookup_token(4, 0).unwrap();
    assert_eq!(token.get_source(), Some("b.ts"));
    assert_eq!(token.get_src_line(), 0);
}
