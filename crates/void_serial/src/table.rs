//! Table codec: document <-> text
//!
//! A document is either a lone atom encoding or the node table as a JSON
//! array. Indentation is purely cosmetic.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value as Json;

use crate::error::Result;

/// Encoded form of one value graph
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// Atom root: plain atom, builder or reference encoding
    Atom(Json),
    /// Composite root: node table, root at index 0
    Table(Vec<Json>),
}

impl Document {
    /// Table entries, empty for atom documents
    pub fn entries(&self) -> &[Json] {
        match self {
            Self::Atom(_) => &[],
            Self::Table(entries) => entries,
        }
    }

    /// Convert into a single JSON value
    pub fn into_json(self) -> Json {
        match self {
            Self::Atom(atom) => atom,
            Self::Table(entries) => Json::Array(entries),
        }
    }

    /// Interpret a JSON value: arrays are tables, anything else is an atom
    pub fn from_json(json: Json) -> Self {
        match json {
            Json::Array(entries) => Self::Table(entries),
            atom => Self::Atom(atom),
        }
    }
}

impl Serialize for Document {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Atom(atom) => atom.serialize(serializer),
            Self::Table(entries) => entries.serialize(serializer),
        }
    }
}

/// Renders and parses document text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCodec {
    indent: Option<usize>,
}

impl TableCodec {
    /// Compact output
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty output with `indent` spaces per level
    pub fn with_indent(mut self, indent: Option<usize>) -> Self {
        self.indent = indent;
        self
    }

    /// Render a document to text
    pub fn render(&self, doc: &Document) -> Result<String> {
        let Some(width) = self.indent else {
            return Ok(serde_json::to_string(doc)?);
        };
        let indent = vec![b' '; width];
        let mut out = Vec::new();
        let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&indent));
        doc.serialize(&mut ser)?;
        // serde_json only writes valid UTF-8
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Parse text into a document
    pub fn parse(&self, text: &str) -> Result<Document> {
        let json: Json = serde_json::from_str(text)?;
        Ok(Document::from_json(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use serde_json::json;

    #[test]
    fn test_render_compact() {
        let doc = Document::Table(vec![json!({ "a": { "#": 1 } }), json!([1, 2])]);
        let text = TableCodec::new().render(&doc).unwrap();
        assert_eq!(text, r##"[{"a":{"#":1}},[1,2]]"##);
    }

    #[test]
    fn test_render_indented() {
        let doc = Document::Table(vec![json!({ "x": 1 })]);
        let text = TableCodec::new().with_indent(Some(2)).render(&doc).unwrap();
        assert_eq!(text, "[\n  {\n    \"x\": 1\n  }\n]");
    }

    #[test]
    fn test_parse_atom_and_table() {
        let codec = TableCodec::new();
        assert_eq!(codec.parse("\"hi\"").unwrap(), Document::Atom(json!("hi")));
        assert_eq!(
            codec.parse(r##"{"#.":"Number","#v":"NaN"}"##).unwrap(),
            Document::Atom(json!({ "#.": "Number", "#v": "NaN" }))
        );
        assert_eq!(
            codec.parse("[[{\"#\":0}]]").unwrap(),
            Document::Table(vec![json!([{ "#": 0 }])])
        );
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(TableCodec::new().parse("[{"), Err(CodecError::Json(_))));
    }
}
