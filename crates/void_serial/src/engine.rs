//! Graph codec engine
//!
//! Ties the pieces together:
//!
//! ```text
//! encode: Value ──► Walker (AtomChain, TypeRegistry) ──► Document ──► TableCodec ──► text
//! decode: text ──► TableCodec ──► Document ──► Rehydrator (TypeRegistry, Namespace) ──► Value
//! ```
//!
//! A codec holds only configuration. All scratch state lives in the call,
//! so one codec can serve many threads at once.

use std::sync::Arc;

use crate::atom::{AtomChain, AtomCodec, HostNodeCodec};
use crate::config::CodecConfig;
use crate::error::Result;
use crate::filter::FieldFilter;
use crate::markers::Markers;
use crate::namespace::Namespace;
use crate::registry::TypeRegistry;
use crate::rehydrate::Rehydrator;
use crate::table::{Document, TableCodec};
use crate::value::Value;
use crate::walker::Walker;

/// Encoder/decoder for value graphs
#[derive(Debug, Clone)]
pub struct GraphCodec {
    config: CodecConfig,
    markers: Markers,
    registry: Arc<TypeRegistry>,
    atoms: AtomChain,
    namespace: Namespace,
    table: TableCodec,
}

impl GraphCodec {
    /// Create a codec with the standard atom chain and an empty registry
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            markers: Markers::new(&config.prefix),
            table: TableCodec::new().with_indent(config.indent),
            config,
            registry: Arc::new(TypeRegistry::new()),
            atoms: AtomChain::standard(),
            namespace: Namespace::standard(),
        })
    }

    /// Use a type registry
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Install a host node codec and its builder
    pub fn with_host_nodes(mut self, codec: HostNodeCodec) -> Self {
        codec.install(&mut self.namespace);
        self.atoms = self.atoms.with_host_nodes(codec);
        self
    }

    /// Insert a custom atom codec at a priority position
    pub fn with_atom_codec(mut self, index: usize, codec: impl AtomCodec + 'static) -> Self {
        self.atoms.insert(index, codec);
        self
    }

    /// Register a builder under a dotted path
    pub fn with_builder<F>(mut self, path: &str, builder: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        self.namespace.register(path, builder);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Type registry in use
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Atom codec chain in use
    pub fn atoms(&self) -> &AtomChain {
        &self.atoms
    }

    /// Builder namespace in use
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Encode a value graph to text
    pub fn encode(&self, value: &Value) -> Result<String> {
        self.encode_filtered(value, &FieldFilter::Keep)
    }

    /// Encode a value graph to text, filtering object fields
    pub fn encode_filtered(&self, value: &Value, filter: &FieldFilter) -> Result<String> {
        let doc = self.to_document(value, filter)?;
        self.table.render(&doc)
    }

    /// Encode a value graph to a document
    pub fn to_document(&self, value: &Value, filter: &FieldFilter) -> Result<Document> {
        Walker::new(
            &self.markers,
            &self.atoms,
            &self.registry,
            filter,
            self.config.revive_types,
        )
        .walk(value)
    }

    /// Decode text into a value graph
    pub fn decode(&self, text: &str) -> Result<Value> {
        let doc = self.table.parse(text)?;
        self.from_document(&doc)
    }

    /// Decode a document into a value graph
    pub fn from_document(&self, doc: &Document) -> Result<Value> {
        Rehydrator::new(
            &self.markers,
            &self.registry,
            &self.namespace,
            self.config.revive_types,
        )
        .rehydrate(doc)
    }
}

impl Default for GraphCodec {
    fn default() -> Self {
        // The default configuration always validates
        Self {
            config: CodecConfig::default(),
            markers: Markers::default(),
            registry: Arc::new(TypeRegistry::new()),
            atoms: AtomChain::standard(),
            namespace: Namespace::standard(),
            table: TableCodec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;

    #[test]
    fn test_invalid_config() {
        let result = GraphCodec::new(CodecConfig::default().with_prefix(""));
        assert!(matches!(result, Err(CodecError::InvalidConfig(_))));
    }

    #[test]
    fn test_inspector_prefix() {
        let codec = GraphCodec::new(CodecConfig::inspector()).unwrap();
        let root = Value::array(vec![Value::Undefined]);
        assert_eq!(codec.encode(&root).unwrap(), r#"[[{"$":-1}]]"#);
    }

    #[test]
    fn test_indent_is_cosmetic() {
        let pretty = GraphCodec::new(CodecConfig::default().with_indent(4)).unwrap();
        let compact = GraphCodec::default();

        let root = Value::object_from([("a", 1.0), ("b", 2.0)]);
        let text = pretty.encode(&root).unwrap();
        assert!(text.contains("\n    "));

        let back = compact.decode(&text).unwrap();
        assert_eq!(back.get("b"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_custom_builder() {
        let codec = GraphCodec::default().with_builder("game.Color", |args| {
            Ok(args.first().and_then(|v| v.as_str()).map(|s| Value::from(s.to_uppercase())))
        });
        let value = codec.decode(r##"{"#.":"game.Color","#v":"red"}"##).unwrap();
        assert_eq!(value, Value::from("RED"));
    }
}
