use super::javascript::{JavaScriptAdapter, JavaScriptFactory};
use super::typescript::{line_mapped, TypeScriptFactory};
use crate::adapter::{
    render_template, setting_str, settings_from, Adapter, AdapterContext, AdapterFactory, AdapterMeta, AdapterType,
    Compiled, Fragment, Schema, SettingSchema, TemplateVars,
};
use crate::error::{AdapterError, AdapterResult, CompileError};
use crate::script::{format_js, minify_js, strip_types, transform_jsx, JsxOptions};
use pen_common::{FileMap, Settings};
use serde_json::json;

static JSX_META: AdapterMeta = AdapterMeta {
    id: "jsx",
    adapter_type: AdapterType::Script,
    name: "JSX",
    description: "JavaScript with JSX elements",
    extends: Some("javascript"),
    file_extension: ".jsx",
    mime_type: "text/jsx",
    compile_targets: &["javascript"],
    can_minify: true,
};

static TSX_META: AdapterMeta = AdapterMeta {
    id: "tsx",
    adapter_type: AdapterType::Script,
    name: "TSX",
    description: "TypeScript with JSX elements",
    extends: Some("typescript"),
    file_extension: ".tsx",
    mime_type: "text/tsx",
    compile_targets: &["javascript"],
    can_minify: true,
};

const JSX_TEMPLATE: &str = r#"import React from 'react';
import { createRoot } from 'react-dom/client';

function App() {
  return <h1>Hello from {projectName}</h1>;
}

const root = document.createElement('div');
document.body.append(root);
createRoot(root).render(<App />);
"#;

const TSX_TEMPLATE: &str = r#"import React from 'react';
import { createRoot } from 'react-dom/client';

interface AppProps {
  title: string;
}

function App({ title }: AppProps) {
  return <h1>{title}</h1>;
}

const root = document.createElement('div');
document.body.append(root);
createRoot(root).render(<App title="Hello from {projectName}" />);
"#;

const COMPILERS: &[&str] = &["react", "preact"];

/// `jsx` and `tsx`
pub struct JsxFactory {
    typed: bool,
}

impl JsxFactory {
    pub fn jsx() -> Self {
        Self { typed: false }
    }

    pub fn tsx() -> Self {
        Self { typed: true }
    }
}

impl AdapterFactory for JsxFactory {
    fn meta(&self) -> &'static AdapterMeta {
        if self.typed {
            &TSX_META
        } else {
            &JSX_META
        }
    }

    fn default_settings(&self) -> Settings {
        let mut settings = if self.typed {
            TypeScriptFactory::typed_defaults()
        } else {
            JavaScriptFactory.default_settings()
        };
        settings.extend(settings_from(&[
            ("compiler", json!("react")),
            ("pragma", json!("")),
            ("pragmaFrag", json!("")),
        ]));
        settings
    }

    fn schema(&self) -> Schema {
        let mut schema = if self.typed {
            TypeScriptFactory::typed_schema()
        } else {
            JavaScriptFactory::base_schema()
        };
        schema.insert(
            "compiler".to_string(),
            SettingSchema::select("JSX Compiler", "Library the elements are created with", "react", COMPILERS),
        );
        schema.insert(
            "pragma".to_string(),
            SettingSchema::text("Pragma", "Element factory, overrides the compiler default", ""),
        );
        schema.insert(
            "pragmaFrag".to_string(),
            SettingSchema::text("Fragment Pragma", "Fragment component, overrides the compiler default", ""),
        );
        schema
    }

    fn default_template(&self, vars: &TemplateVars) -> String {
        if self.typed {
            render_template(TSX_TEMPLATE, vars)
        } else {
            render_template(JSX_TEMPLATE, vars)
        }
    }

    fn create(&self, settings: Settings, _ctx: &AdapterContext) -> Box<dyn Adapter> {
        Box::new(JsxAdapter {
            meta: self.meta(),
            typed: self.typed,
            base: JavaScriptAdapter::new(settings),
        })
    }
}

pub struct JsxAdapter {
    meta: &'static AdapterMeta,
    typed: bool,
    base: JavaScriptAdapter,
}

impl JsxAdapter {
    fn options(&self, filename: &str) -> Result<JsxOptions, CompileError> {
        let settings = self.base.settings();
        let mut options = match setting_str(settings, "compiler").unwrap_or("react") {
            "react" => JsxOptions::react(),
            "preact" => JsxOptions::preact(),
            other => {
                return Err(CompileError::new(
                    self.meta.id,
                    filename,
                    format!("JSX compiler '{other}' is not supported"),
                ))
            }
        };
        if let Some(pragma) = setting_str(settings, "pragma").filter(|p| !p.is_empty()) {
            options.pragma = pragma.to_string();
        }
        if let Some(fragment) = setting_str(settings, "pragmaFrag").filter(|p| !p.is_empty()) {
            options.fragment = fragment.to_string();
        }
        Ok(options)
    }

    /// Plain JavaScript with the same line structure as `content`
    fn lower(&self, filename: &str, content: &str) -> AdapterResult<String> {
        let options = self.options(filename)?;
        let js = transform_jsx(content, &options)
            .map_err(|e| super::compile_error(self.meta, filename, content, e))?;
        if !self.typed {
            return Ok(js);
        }
        strip_types(&js).map_err(|e| super::compile_error(self.meta, filename, &js, e))
    }

    fn transpile(&self, filename: &str, content: &str) -> AdapterResult<Compiled> {
        let js = self.base.finish(&self.lower(filename, content)?);
        Ok(line_mapped(self.meta, filename, content, &js)?)
    }
}

impl Adapter for JsxAdapter {
    fn meta(&self) -> &'static AdapterMeta {
        self.meta
    }

    fn settings(&self) -> &Settings {
        self.base.settings()
    }

    fn render(&self, filename: &str, content: &str, _files: &FileMap) -> AdapterResult<Fragment> {
        let Compiled { code, map } = self.transpile(filename, content)?;
        Ok(Fragment::script(code, map))
    }

    fn beautify(&self, filename: &str, content: &str) -> AdapterResult<String> {
        format_js(content).map_err(|e| super::format_error(self.meta, filename, content, e.message, e.offset))
    }

    fn minify(&self, filename: &str, content: &str) -> AdapterResult<String> {
        let js = self.lower(filename, content)?;
        minify_js(&js).map_err(|e| super::compile_error(self.meta, filename, &js, e))
    }

    fn compile_to(&self, filename: &str, target: &str, content: &str) -> AdapterResult<Compiled> {
        if target != "javascript" {
            return Err(AdapterError::unsupported(self.meta.id, format!("compile to {target}")));
        }
        self.transpile(filename, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(fragment: Fragment) -> String {
        match fragment {
            Fragment::Script { js, .. } => js,
            other => panic!("unexpected fragment {other:?}"),
        }
    }

    #[test]
    fn test_react_default() {
        let jsx = JsxFactory::jsx().instantiate(&Settings::new(), &AdapterContext::default());
        let js = script(jsx.render("app.jsx", "const a = <b>hi</b>;", &FileMap::new()).unwrap());
        assert_eq!(js, "const a = React.createElement(\"b\", null, \"hi\");");
    }

    #[test]
    fn test_preact_with_pragma_override() {
        let overrides = settings_from(&[("compiler", json!("preact")), ("pragmaFrag", json!("Frag"))]);
        let jsx = JsxFactory::jsx().instantiate(&overrides, &AdapterContext::default());
        let js = script(jsx.render("app.jsx", "x = <><i /></>", &FileMap::new()).unwrap());
        assert_eq!(js, "x = h(Frag, null, h(\"i\", null))");
    }

    #[test]
    fn test_unsupported_compiler() {
        let overrides = settings_from(&[("compiler", json!("solid"))]);
        let jsx = JsxFactory::jsx().instantiate(&overrides, &AdapterContext::default());
        let err = jsx.render("app.jsx", "<a/>", &FileMap::new()).unwrap_err();
        assert!(err.to_string().contains("solid"));
    }

    #[test]
    fn test_tsx_strips_types_after_jsx() {
        let tsx = JsxFactory::tsx().instantiate(&Settings::new(), &AdapterContext::default());
        let src = "const App = (props: { n: number }) => <p>{props.n as number}</p>;";
        let js = script(tsx.render("app.tsx", src, &FileMap::new()).unwrap());
        assert_eq!(js, "const App = (props) => React.createElement(\"p\", null, props.n );");
    }

    #[test]
    fn test_tsx_settings_include_typescript() {
        let settings = JsxFactory::tsx().default_settings();
        assert_eq!(settings["target"], "ES2022");
        assert_eq!(settings["compiler"], "react");
        assert_eq!(JsxFactory::tsx().meta().extends, Some("typescript"));
    }
}
