use super::css::{CssAdapter, CssFactory};
use crate::adapter::{
    render_template, Adapter, AdapterContext, AdapterFactory, AdapterMeta, AdapterType, CdnResources, Compiled,
    Fragment, Schema, TemplateVars,
};
use crate::error::{AdapterError, AdapterResult, CompileError};
use grass::{ErrorKind, InputSyntax, Options, OutputStyle};
use pen_common::{FileMap, Settings};

static SASS_META: AdapterMeta = AdapterMeta {
    id: "sass",
    adapter_type: AdapterType::Style,
    name: "Sass",
    description: "Sass indented syntax compiled to CSS",
    extends: Some("css"),
    file_extension: ".sass",
    mime_type: "text/x-sass",
    compile_targets: &["css"],
    can_minify: true,
};

static SCSS_META: AdapterMeta = AdapterMeta {
    id: "scss",
    adapter_type: AdapterType::Style,
    name: "SCSS",
    description: "Sassy CSS compiled to CSS",
    extends: Some("css"),
    file_extension: ".scss",
    mime_type: "text/x-scss",
    compile_targets: &["css"],
    can_minify: true,
};

const SASS_TEMPLATE: &str = "$accent: #4f46e5\n\nbody\n  font-family: system-ui, sans-serif\n  padding: 2rem\n\nh1\n  color: $accent\n";

const SCSS_TEMPLATE: &str = "$accent: #4f46e5;\n\nbody {\n  font-family: system-ui, sans-serif;\n  padding: 2rem;\n\n  h1 {\n    color: $accent;\n  }\n}\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Indented,
    Scss,
}

/// `sass` and `scss`, both built on top of plain CSS
pub struct SassFactory {
    syntax: Syntax,
    base: CssFactory,
}

impl SassFactory {
    pub fn sass() -> Self {
        Self {
            syntax: Syntax::Indented,
            base: CssFactory,
        }
    }

    pub fn scss() -> Self {
        Self {
            syntax: Syntax::Scss,
            base: CssFactory,
        }
    }
}

fn meta_for(syntax: Syntax) -> &'static AdapterMeta {
    match syntax {
        Syntax::Indented => &SASS_META,
        Syntax::Scss => &SCSS_META,
    }
}

impl AdapterFactory for SassFactory {
    fn meta(&self) -> &'static AdapterMeta {
        meta_for(self.syntax)
    }

    fn default_settings(&self) -> Settings {
        self.base.default_settings()
    }

    fn schema(&self) -> Schema {
        self.base.schema()
    }

    fn default_template(&self, vars: &TemplateVars) -> String {
        match self.syntax {
            Syntax::Indented => render_template(SASS_TEMPLATE, vars),
            Syntax::Scss => render_template(SCSS_TEMPLATE, vars),
        }
    }

    fn cdn_resources(&self, settings: &Settings) -> CdnResources {
        self.base.cdn_resources(settings)
    }

    fn create(&self, settings: Settings, _ctx: &AdapterContext) -> Box<dyn Adapter> {
        Box::new(SassAdapter {
            syntax: self.syntax,
            base: CssAdapter::new(settings),
        })
    }
}

pub struct SassAdapter {
    syntax: Syntax,
    base: CssAdapter,
}

impl SassAdapter {
    fn compile(&self, filename: &str, content: &str, style: OutputStyle) -> Result<String, CompileError> {
        let input_syntax = match self.syntax {
            Syntax::Indented => InputSyntax::Sass,
            Syntax::Scss => InputSyntax::Scss,
        };
        let options = Options::default().style(style).input_syntax(input_syntax);
        grass::from_string(content.to_string(), &options).map_err(|err| compile_error(self.meta().id, filename, *err))
    }
}

/// Positions in grass diagnostics are zero-based
fn compile_error(adapter_id: &str, filename: &str, err: grass::Error) -> CompileError {
    match err.kind() {
        ErrorKind::ParseError { message, loc, .. } => {
            let position = |n: usize| u32::try_from(n + 1).unwrap_or(u32::MAX);
            CompileError::new(adapter_id, filename, message).at(position(loc.begin.line), position(loc.begin.column))
        }
        other => CompileError::new(adapter_id, filename, format!("{other:?}")),
    }
}

impl Adapter for SassAdapter {
    fn meta(&self) -> &'static AdapterMeta {
        meta_for(self.syntax)
    }

    fn settings(&self) -> &Settings {
        self.base.settings()
    }

    fn render(&self, filename: &str, content: &str, _files: &FileMap) -> AdapterResult<Fragment> {
        let css = self.compile(filename, content, OutputStyle::Expanded)?;
        Ok(Fragment::css(css))
    }

    fn beautify(&self, filename: &str, content: &str) -> AdapterResult<String> {
        match self.syntax {
            Syntax::Scss => self.base.beautify(filename, content).map_err(|err| match err {
                AdapterError::Format(mut e) => {
                    e.adapter_id = self.meta().id.to_string();
                    AdapterError::Format(e)
                }
                other => other,
            }),
            Syntax::Indented => Ok(super::tidy_lines(content)),
        }
    }

    fn minify(&self, filename: &str, content: &str) -> AdapterResult<String> {
        let css = self.compile(filename, content, OutputStyle::Compressed)?;
        Ok(css.trim_end().to_string())
    }

    fn compile_to(&self, filename: &str, target: &str, content: &str) -> AdapterResult<Compiled> {
        if target != "css" {
            return Err(AdapterError::unsupported(self.meta().id, format!("compile to {target}")));
        }
        let code = self.compile(filename, content, OutputStyle::Expanded)?;
        Ok(Compiled { code, map: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scss() -> Box<dyn Adapter> {
        SassFactory::scss().instantiate(&Settings::new(), &AdapterContext::default())
    }

    #[test]
    fn test_indented_syntax() {
        let sass = SassFactory::sass().instantiate(&Settings::new(), &AdapterContext::default());
        let fragment = sass
            .render("style.sass", "$c: red\na\n  color: $c\n", &FileMap::new())
            .unwrap();
        match fragment {
            Fragment::Style { css, style_type, .. } => {
                assert_eq!(css.trim(), "a {\n  color: red;\n}");
                assert_eq!(style_type, "text/css");
            }
            other => panic!("unexpected fragment {other:?}"),
        }
    }

    #[test]
    fn test_scss_nesting_and_minify() {
        let src = "$c: red;\na { b { color: $c; } }\n";
        let compiled = scss().compile_to("style.scss", "css", src).unwrap();
        assert_eq!(compiled.code.trim(), "a b {\n  color: red;\n}");
        assert_eq!(scss().minify("style.scss", src).unwrap(), "a b{color:red}");
    }

    #[test]
    fn test_compile_error_position() {
        let err = scss()
            .render("style.scss", "a {\n  color: $missing;\n}\n", &FileMap::new())
            .unwrap_err();
        match err {
            AdapterError::Compile(e) => {
                assert_eq!(e.adapter_id, "scss");
                assert_eq!(e.filename, "style.scss");
                assert!(e.message.contains("Undefined variable"), "{}", e.message);
                assert_eq!((e.line, e.column), (Some(2), Some(10)));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_indented_syntax_error_has_position() {
        let sass = SassFactory::sass().instantiate(&Settings::new(), &AdapterContext::default());
        let err = sass
            .minify("style.sass", "a\n  color: red\nb\n  width: $w\n")
            .unwrap_err();
        match err {
            AdapterError::Compile(e) => {
                assert_eq!(e.adapter_id, "sass");
                assert!(e.line.is_some());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_target() {
        assert!(matches!(
            scss().compile_to("style.scss", "less", "a{}"),
            Err(AdapterError::Unsupported { .. })
        ));
    }
}
