use crate::error::{SourceMapError, SourceMapResult};
use crate::utils::count_lines;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sourcemap::{SourceMap as ExternalSourceMap, SourceMapBuilder as ExternalBuilder};

const DATA_URL_PREFIX: &str = "data:application/json;charset=utf-8;base64,";

/// Concatenates generated chunks while keeping a mapping back to their sources
///
/// Every append mode advances the same line/column cursor, so raw glue code
/// shifts the mappings of everything appended after it.
pub struct SourceMapBuilder {
    builder: ExternalBuilder,
    code: String,
    current_line: u32,
    current_col: u32,
}

impl SourceMapBuilder {
    /// Create a new builder for the generated file `output_file`
    pub fn new(output_file: &str) -> Self {
        Self {
            builder: ExternalBuilder::new(Some(output_file)),
            code: String::new(),
            current_line: 0,
            current_col: 0,
        }
    }

    /// Append text without any mapping (glue code, banners, separators)
    pub fn add_raw(&mut self, text: &str) {
        self.push(text);
    }

    /// Append text whose lines correspond 1:1 to the lines of `source`
    pub fn add_identity(&mut self, text: &str, source: &str, contents: Option<&str>) {
        let src_id = self.register_source(source, contents);

        for (i, line) in text.split('\n').enumerate() {
            if line.is_empty() && i > 0 {
                continue;
            }
            let i = i as u32;
            let dst_col = if i == 0 { self.current_col } else { 0 };
            self.builder
                .add_raw(self.current_line + i, dst_col, i, 0, Some(src_id), None, false);
        }

        self.push(text);
    }

    /// Append text produced by a nested compiler together with that compiler's map
    ///
    /// Generated lines of `map_json` are shifted by the current line; columns on the
    /// first generated line are shifted by the current column. `force_source`
    /// replaces whatever source name the nested map uses.
    pub fn add_with_map(
        &mut self,
        text: &str,
        map_json: &str,
        force_source: Option<&str>,
        contents: Option<&str>,
    ) -> SourceMapResult<()> {
        let nested = ExternalSourceMap::from_slice(map_json.as_bytes())?;
        let forced_id = force_source.map(|source| self.register_source(source, contents));

        for token in nested.tokens() {
            let src_id = match (forced_id, token.get_source()) {
                (Some(id), _) => Some(id),
                (None, Some(source)) => {
                    let nested_contents = nested.get_source_contents(token.get_src_id());
                    Some(self.register_source(source, nested_contents.or(contents)))
                }
                (None, None) => None,
            };
            let name_id = token.get_name().map(|name| self.builder.add_name(name));

            let dst_line = token.get_dst_line() + self.current_line;
            let dst_col = if token.get_dst_line() == 0 {
                token.get_dst_col() + self.current_col
            } else {
                token.get_dst_col()
            };

            self.builder.add_raw(
                dst_line,
                dst_col,
                token.get_src_line(),
                token.get_src_col(),
                src_id,
                name_id,
                false,
            );
        }

        self.push(text);
        Ok(())
    }

    fn register_source(&mut self, source: &str, contents: Option<&str>) -> u32 {
        let id = self.builder.add_source(source);
        if contents.is_some() {
            self.builder.set_source_contents(id, contents);
        }
        id
    }

    fn push(&mut self, text: &str) {
        self.code.push_str(text);
        let tail = match text.rfind('\n') {
            Some(last) => {
                self.current_line += count_lines(text);
                self.current_col = 0;
                &text[last + 1..]
            }
            None => text,
        };
        self.current_col += tail.chars().count() as u32;
    }

    /// Get the current position in the generated output (0-based line, column)
    pub fn current_position(&self) -> (u32, u32) {
        (self.current_line, self.current_col)
    }

    /// Generated text accumulated so far
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Finish, returning the generated text and its map
    pub fn build(self) -> (String, ExternalSourceMap) {
        (self.code, self.builder.into_sourcemap())
    }

    /// Finish, returning the generated text and the map serialized as JSON
    pub fn to_json(self) -> SourceMapResult<(String, String)> {
        let (code, map) = self.build();
        Ok((code, map_to_json(&map)?))
    }

    /// Finish, returning the generated text and an embeddable `data:` URL of the map
    pub fn to_data_url(self) -> SourceMapResult<(String, String)> {
        let (code, json) = self.to_json()?;
        Ok((code, json_to_data_url(&json)))
    }
}

/// Encode source map JSON as a `data:` URL for `sourceMappingURL` comments
pub fn json_to_data_url(json: &str) -> String {
    format!("{DATA_URL_PREFIX}{}", STANDARD.encode(json))
}

/// Serialize a source map to its JSON text
pub fn map_to_json(map: &ExternalSourceMap) -> SourceMapResult<String> {
    let mut buf = Vec::new();
    map.to_writer(&mut buf)?;
    String::from_utf8(buf).map_err(SourceMapError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_token_on_or_after(map: &ExternalSourceMap, line: u32) -> Option<(u32, u32)> {
        map.tokens()
            .filter(|t| t.get_dst_line() >= line)
            .map(|t| (t.get_dst_line(), t.get_src_line()))
            .min()
    }

    #[test]
    fn test_raw_advances_position() {
        let mut builder = SourceMapBuilder::new("bundle.js");

        builder.add_raw("// glue");
        assert_eq!(builder.current_position(), (0, 7));

        builder.add_raw("\n");
        assert_eq!(builder.current_position(), (1, 0));

        builder.add_raw("a\nbc\néé");
        assert_eq!(builder.current_position(), (3, 2));
    }

    #[test]
    fn test_identity_chunks_are_offset() {
        let mut builder = SourceMapBuilder::new("bundle.js");
        builder.add_identity("a();\nb();\nc();\n", "one.js", None);
        builder.add_identity("d();\ne();\nf();\ng();\nh();\n", "two.js", None);

        let (code, map) = builder.build();
        assert_eq!(code.lines().count(), 8);

        let second: Vec<_> = map
            .tokens()
            .filter(|t| t.get_source() == Some("two.js"))
            .collect();
        assert_eq!(second.len(), 5);
        // 0-based line 3 is the fourth generated line
        assert_eq!(second[0].get_dst_line(), 3);
        assert_eq!(second[0].get_src_line(), 0);
        assert_eq!(second[4].get_dst_line(), 7);
        assert_eq!(second[4].get_src_line(), 4);
    }

    #[test]
    fn test_merge_nested_map() {
        let mut nested = SourceMapBuilder::new("out.js");
        nested.add_identity("let x = 1;\nlet y = 2;\n", "input.ts", Some("let x: number = 1;"));
        let (nested_code, nested_json) = nested.to_json().unwrap();

        let mut builder = SourceMapBuilder::new("bundle.js");
        builder.add_raw("// header\n// header\n");
        builder
            .add_with_map(&nested_code, &nested_json, None, None)
            .unwrap();

        let (code, map) = builder.build();
        assert!(code.starts_with("// header\n// header\nlet x = 1;"));
        assert_eq!(first_token_on_or_after(&map, 0), Some((2, 0)));
        assert_eq!(map.get_source(0), Some("input.ts"));
        assert_eq!(map.get_source_contents(0), Some("let x: number = 1;"));
    }

    #[test]
    fn test_force_source_name() {
        let mut nested = SourceMapBuilder::new("out.js");
        nested.add_identity("a;\n", "anonymous", None);
        let (code, json) = nested.to_json().unwrap();

        let mut builder = SourceMapBuilder::new("bundle.js");
        builder
            .add_with_map(&code, &json, Some("script.tsx"), None)
            .unwrap();
        let (_, map) = builder.build();

        assert!(map.tokens().all(|t| t.get_source() == Some("script.tsx")));
    }

    #[test]
    fn test_invalid_nested_map() {
        let mut builder = SourceMapBuilder::new("bundle.js");
        assert!(builder.add_with_map("x", "not json", None, None).is_err());
    }

    #[test]
    fn test_data_url() {
        let mut builder = SourceMapBuilder::new("bundle.js");
        builder.add_identity("x();\n", "x.js", None);
        let (code, url) = builder.to_data_url().unwrap();

        assert_eq!(code, "x();\n");
        assert!(url.starts_with(DATA_URL_PREFIX));
        let decoded = STANDARD.decode(&url[DATA_URL_PREFIX.len()..]).unwrap();
        let json = String::from_utf8(decoded).unwrap();
        assert!(json.contains("\"version\":3"));
        assert!(json.contains("x.js"));
    }
}
