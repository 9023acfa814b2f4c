use super::javascript::{JavaScriptAdapter, JavaScriptFactory};
use crate::adapter::{
    render_template, settings_from, Adapter, AdapterContext, AdapterFactory, AdapterMeta, AdapterType, Compiled,
    Fragment, Schema, SettingSchema, TemplateVars,
};
use crate::error::{AdapterError, AdapterResult, CompileError};
use crate::script::{format_js, minify_js, strip_types};
use pen_common::{FileMap, Settings};
use pen_sourcemap::SourceMapBuilder;
use serde_json::json;

static META: AdapterMeta = AdapterMeta {
    id: "typescript",
    adapter_type: AdapterType::Script,
    name: "TypeScript",
    description: "JavaScript with type annotations, erased before running",
    extends: Some("javascript"),
    file_extension: ".ts",
    mime_type: "text/typescript",
    compile_targets: &["javascript"],
    can_minify: true,
};

const TEMPLATE: &str = r#"interface Greeting {
  name: string;
  excited?: boolean;
}

function greet({ name, excited }: Greeting): string {
  return `Hello from ${name}${excited ? '!' : '.'}`;
}

console.log(greet({ name: '{projectName}', excited: true }));
"#;

pub const TARGETS: &[&str] = &["ES2020", "ES2021", "ES2022", "ESNext"];

pub struct TypeScriptFactory;

impl TypeScriptFactory {
    pub(crate) fn typed_defaults() -> Settings {
        let mut settings = JavaScriptFactory.default_settings();
        settings.extend(settings_from(&[("target", json!("ES2022")), ("strict", json!(true))]));
        settings
    }

    pub(crate) fn typed_schema() -> Schema {
        let mut schema = JavaScriptFactory::base_schema();
        schema.insert(
            "target".to_string(),
            SettingSchema::select("Target", "Language level of the emitted JavaScript", "ES2022", TARGETS),
        );
        schema.insert(
            "strict".to_string(),
            SettingSchema::boolean("Strict", "Strict type-checking options", true),
        );
        schema
    }
}

impl AdapterFactory for TypeScriptFactory {
    fn meta(&self) -> &'static AdapterMeta {
        &META
    }

    fn default_settings(&self) -> Settings {
        Self::typed_defaults()
    }

    fn schema(&self) -> Schema {
        Self::typed_schema()
    }

    fn default_template(&self, vars: &TemplateVars) -> String {
        render_template(TEMPLATE, vars)
    }

    fn create(&self, settings: Settings, _ctx: &AdapterContext) -> Box<dyn Adapter> {
        Box::new(TypeScriptAdapter {
            base: JavaScriptAdapter::new(settings),
        })
    }
}

pub struct TypeScriptAdapter {
    base: JavaScriptAdapter,
}

/// `app.ts` → `app.js`
pub(crate) fn output_name(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) => format!("{stem}.js"),
        None => format!("{filename}.js"),
    }
}

/// JavaScript whose lines match the source 1:1, plus the line map for it
pub(crate) fn line_mapped(
    meta: &AdapterMeta,
    filename: &str,
    source: &str,
    js: &str,
) -> Result<Compiled, CompileError> {
    let mut builder = SourceMapBuilder::new(&output_name(filename));
    builder.add_identity(js, filename, Some(source));
    let (code, map) = builder
        .to_json()
        .map_err(|e| CompileError::new(meta.id, filename, e.to_string()))?;
    Ok(Compiled { code, map: Some(map) })
}

impl TypeScriptAdapter {
    fn transpile(&self, filename: &str, content: &str) -> AdapterResult<Compiled> {
        let js = strip_types(content).map_err(|e| super::compile_error(&META, filename, content, e))?;
        let js = self.base.finish(&js);
        Ok(line_mapped(&META, filename, content, &js)?)
    }
}

impl Adapter for TypeScriptAdapter {
    fn meta(&self) -> &'static AdapterMeta {
        &META
    }

    fn settings(&self) -> &Settings {
        self.base.settings()
    }

    fn render(&self, filename: &str, content: &str, _files: &FileMap) -> AdapterResult<Fragment> {
        let Compiled { code, map } = self.transpile(filename, content)?;
        Ok(Fragment::script(code, map))
    }

    fn beautify(&self, filename: &str, content: &str) -> AdapterResult<String> {
        format_js(content).map_err(|e| super::format_error(&META, filename, content, e.message, e.offset))
    }

    fn minify(&self, filename: &str, content: &str) -> AdapterResult<String> {
        let js = strip_types(content).map_err(|e| super::compile_error(&META, filename, content, e))?;
        minify_js(&js).map_err(|e| super::compile_error(&META, filename, &js, e))
    }

    fn compile_to(&self, filename: &str, target: &str, content: &str) -> AdapterResult<Compiled> {
        if target != "javascript" {
            return Err(AdapterError::unsupported(META.id, format!("compile to {target}")));
        }
        self.transpile(filename, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcemap::SourceMap;

    fn ts() -> Box<dyn Adapter> {
        TypeScriptFactory.instantiate(&Settings::new(), &AdapterContext::default())
    }

    #[test]
    fn test_defaults_extend_javascript() {
        let settings = TypeScriptFactory.default_settings();
        assert_eq!(settings["moduleType"], "module");
        assert_eq!(settings["target"], "ES2022");
        assert!(TypeScriptFactory.schema().contains_key("moduleType"));
    }

    #[test]
    fn test_render_with_line_map() {
        let src = "type N = number;\nconst n: N = 1;\nconsole.log(n);\n";
        let Fragment::Script { js, map } = ts().render("app.ts", src, &FileMap::new()).unwrap() else {
            panic!("expected a script fragment");
        };
        assert_eq!(js.lines().nth(1).map(str::trim), Some("const n = 1;"));

        let map = SourceMap::from_slice(map.unwrap().as_bytes()).unwrap();
        assert_eq!(map.get_file(), Some("app.js"));
        let token = map.lookup_token(2, 0).unwrap();
        assert_eq!(token.get_source(), Some("app.ts"));
        assert_eq!(token.get_src_line(), 2);
    }

    #[test]
    fn test_compile_to_javascript() {
        let compiled = ts().compile_to("app.ts", "javascript", "let x: string = 'a';").unwrap();
        assert_eq!(compiled.code, "let x = 'a';");
        assert!(compiled.map.is_some());
        assert!(ts().compile_to("app.ts", "css", "").is_err());
    }

    #[test]
    fn test_minify_strips_types_first() {
        assert_eq!(ts().minify("app.ts", "const a: number = 1;").unwrap(), "const a=1;");
    }

    #[test]
    fn test_output_name() {
        assert_eq!(output_name("src/app.ts"), "src/app.js");
        assert_eq!(output_name("main"), "main.js");
    }
}
