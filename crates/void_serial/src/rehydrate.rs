//! Rehydrator: node table -> live value graph
//!
//! Entries may reference entries at higher indices or themselves, so decoding
//! runs in two strictly ordered passes:
//!
//! 1. allocate one live composite per entry, binding tagged objects to their
//!    registered behavior;
//! 2. resolve every field of every entry, turning references into shared
//!    handles and builders into atoms.

use serde_json::{Map, Value as Json};

use crate::error::{CodecError, Result};
use crate::markers::{Encoding, Markers, UNDEFINED_ID};
use crate::namespace::Namespace;
use crate::registry::TypeRegistry;
use crate::table::Document;
use crate::value::Value;

/// Rebuilds value graphs from documents
pub struct Rehydrator<'a> {
    markers: &'a Markers,
    registry: &'a TypeRegistry,
    namespace: &'a Namespace,
    revive_types: bool,
}

impl<'a> Rehydrator<'a> {
    /// Create a rehydrator
    pub fn new(
        markers: &'a Markers,
        registry: &'a TypeRegistry,
        namespace: &'a Namespace,
        revive_types: bool,
    ) -> Self {
        Self {
            markers,
            registry,
            namespace,
            revive_types,
        }
    }

    /// Decode a document into its root value
    pub fn rehydrate(&self, doc: &Document) -> Result<Value> {
        match doc {
            Document::Atom(atom) => self.decode(atom, &[]),
            Document::Table(entries) => self.rehydrate_table(entries),
        }
    }

    fn rehydrate_table(&self, entries: &[Json]) -> Result<Value> {
        let live = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| self.bind(index, entry))
            .collect::<Result<Vec<_>>>()?;

        for (entry, target) in entries.iter().zip(&live) {
            self.resolve(entry, target, &live)?;
        }

        log::debug!("Rehydrated {} table entries", live.len());
        live.into_iter()
            .next()
            .ok_or_else(|| CodecError::malformed("empty node table"))
    }

    /// Pass 1: allocate the live composite for an entry
    fn bind(&self, index: usize, entry: &Json) -> Result<Value> {
        match entry {
            Json::Array(items) => Ok(Value::array(Vec::with_capacity(items.len()))),
            Json::Object(map) => match map.get(self.markers.tag_key()) {
                None => Ok(Value::object()),
                Some(Json::String(name)) if self.revive_types => {
                    Ok(Value::Object(self.registry.instantiate(name)?))
                }
                Some(Json::String(name)) => {
                    log::warn!("Ignoring type tag '{}' on entry {}: type revival is off", name, index);
                    Ok(Value::object())
                }
                Some(other) => Err(CodecError::malformed(format!(
                    "entry {} has a non-string type tag {}",
                    index, other
                ))),
            },
            other => Err(CodecError::malformed(format!(
                "entry {} is not an object or array: {}",
                index, other
            ))),
        }
    }

    /// Pass 2: fill a live composite from its entry
    fn resolve(&self, entry: &Json, target: &Value, table: &[Value]) -> Result<()> {
        match (entry, target) {
            (Json::Array(items), Value::Array(array)) => {
                let values = items
                    .iter()
                    .map(|item| self.decode(item, table))
                    .collect::<Result<Vec<_>>>()?;
                *array.write() = values;
                Ok(())
            }
            (Json::Object(map), Value::Object(object)) => {
                let fields = self.decode_fields(map, table)?;
                let mut object = object.write();
                for (key, value) in fields {
                    object.insert(key, value);
                }
                Ok(())
            }
            _ => Err(CodecError::malformed("entry shape does not match its composite")),
        }
    }

    fn decode_fields(&self, map: &Map<String, Json>, table: &[Value]) -> Result<Vec<(String, Value)>> {
        let mut fields = Vec::with_capacity(map.len());
        for (key, value) in map {
            if key == self.markers.tag_key() {
                continue;
            }
            fields.push((key.clone(), self.decode(value, table)?));
        }
        Ok(fields)
    }

    /// Decode one field value (or a lone atom document with an empty table)
    fn decode(&self, json: &Json, table: &[Value]) -> Result<Value> {
        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| CodecError::malformed(format!("unrepresentable number {}", n))),
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Array(_) => Err(CodecError::malformed("nested array inside a table entry")),
            Json::Object(map) => match self.markers.classify(map) {
                Encoding::Reference(UNDEFINED_ID) => Ok(Value::Undefined),
                Encoding::Reference(id) => self.lookup(id, table),
                Encoding::Builder { name, args } => self.namespace.build(name, args),
                Encoding::Unknown => Err(CodecError::malformed(format!(
                    "object carries neither a reference nor a builder marker: {}",
                    json
                ))),
            },
        }
    }

    fn lookup(&self, id: i64, table: &[Value]) -> Result<Value> {
        if table.is_empty() {
            return Err(CodecError::malformed(format!(
                "reference to entry {} outside a node table",
                id
            )));
        }
        usize::try_from(id)
            .ok()
            .and_then(|index| table.get(index))
            .cloned()
            .ok_or_else(|| CodecError::malformed(format!("reference to missing entry {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Behavior;
    use serde_json::json;

    struct Fixture {
        markers: Markers,
        registry: TypeRegistry,
        namespace: Namespace,
        revive: bool,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                markers: Markers::new("#"),
                registry: TypeRegistry::new(),
                namespace: Namespace::standard(),
                revive: true,
            }
        }

        fn decode(&self, doc: Document) -> Result<Value> {
            Rehydrator::new(&self.markers, &self.registry, &self.namespace, self.revive)
                .rehydrate(&doc)
        }
    }

    #[test]
    fn test_forward_and_self_references() {
        let doc = Document::Table(vec![
            json!({ "next": { "#": 1 }, "me": { "#": 0 } }),
            json!({ "back": { "#": 0 } }),
        ]);
        let root = Fixture::new().decode(doc).unwrap();

        let next = root.get("next").unwrap();
        assert!(root.get("me").unwrap().same(&root));
        assert!(next.get("back").unwrap().same(&root));
    }

    #[test]
    fn test_atom_documents() {
        let fx = Fixture::new();
        assert_eq!(fx.decode(Document::Atom(json!(true))).unwrap(), Value::Bool(true));
        assert!(fx.decode(Document::Atom(json!({ "#": -1 }))).unwrap().is_undefined());
        assert!(matches!(
            fx.decode(Document::Atom(json!({ "#": 0 }))),
            Err(CodecError::MalformedEncoding(_))
        ));
    }

    #[test]
    fn test_type_binding() {
        let mut fx = Fixture::new();
        let point = Behavior::new("Point");
        fx.registry.register(point.clone()).unwrap();

        let root = fx
            .decode(Document::Table(vec![json!({ "#": "Point", "x": 1 })]))
            .unwrap();
        assert!(root.behavior().unwrap().ptr_eq(&point));
        assert_eq!(root.len(), Some(1));
    }

    #[test]
    fn test_unknown_type() {
        let doc = Document::Table(vec![json!({ "#": "Ghost" })]);
        assert!(matches!(Fixture::new().decode(doc), Err(CodecError::UnknownType(_))));
    }

    #[test]
    fn test_tags_ignored_without_revival() {
        let mut fx = Fixture::new();
        fx.revive = false;
        let root = fx
            .decode(Document::Table(vec![json!({ "#": "Ghost", "x": 1 })]))
            .unwrap();
        assert!(root.behavior().is_none());
        assert_eq!(root.len(), Some(1));
    }

    #[test]
    fn test_malformed_tables() {
        let fx = Fixture::new();
        let cases = vec![
            Document::Table(vec![]),
            Document::Table(vec![json!(3)]),
            Document::Table(vec![json!({ "x": { "y": 1 } })]),
            Document::Table(vec![json!({ "x": [1, 2] })]),
            Document::Table(vec![json!({ "x": { "#": 7 } })]),
            Document::Table(vec![json!({ "x": { "#": -2 } })]),
            Document::Table(vec![json!({ "#": 5 })]),
        ];
        for doc in cases {
            assert!(
                matches!(fx.decode(doc.clone()), Err(CodecError::MalformedEncoding(_))),
                "expected malformed: {:?}",
                doc
            );
        }
    }
}
