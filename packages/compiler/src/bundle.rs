use crate::error::RenderResult;
use crate::pipeline::{is_javascript, script_type, source_of, Pipeline};
use pen_adapters::{AdapterType, Fragment};
use pen_common::{FileMap, ProjectConfig};
use pen_sourcemap::{json_to_data_url, SourceMapBuilder};
use tracing::debug;

pub const BUNDLE_FILE: &str = "bundle.js";

/// All JavaScript editors of a project concatenated into one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBundle {
    /// Code ending in an inline `sourceMappingURL` comment
    pub code: String,
    /// Source map JSON
    pub map: String,
}

/// Concatenate every script editor in render order, stitching a source map
/// that points back at each editor's own file
pub fn bundle_scripts(pipeline: &Pipeline, files: &FileMap, config: &ProjectConfig) -> RenderResult<ScriptBundle> {
    let cdn = pipeline.cdn(config)?;
    let mut builder = SourceMapBuilder::new(BUNDLE_FILE);

    for editor in pipeline.ordered_editors(config)? {
        if editor.adapter_type() != AdapterType::Script {
            continue;
        }

        let filename = editor.entry.filename.as_str();
        let adapter = pipeline.instantiate(&editor, config);
        if !is_javascript(&script_type(adapter.settings())) {
            debug!(filename, "Skipping non-JavaScript script editor");
            continue;
        }

        let content = source_of(files, filename);
        let Fragment::Script { js, map } = adapter.render(filename, content, files)? else {
            continue;
        };
        let js = cdn.transform_js(&js);

        builder.add_raw(&format!("// {filename}\n"));
        match map {
            Some(map) => builder.add_with_map(&js, &map, Some(filename), Some(content))?,
            None => builder.add_identity(&js, filename, Some(content)),
        }
        if !js.ends_with('\n') {
            builder.add_raw("\n");
        }
    }

    let (mut code, map) = builder.to_json()?;
    code.push_str(&format!("//# sourceMappingURL={}\n", json_to_data_url(&map)));
    Ok(ScriptBundle { code, map })
}
