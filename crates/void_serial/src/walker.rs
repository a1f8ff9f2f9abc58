//! Graph walker
//!
//! Flattens a value graph into the node table. Composites are numbered in
//! pre-order of first visit, so the root is always entry 0. A composite
//! reached again (shared or cyclic) becomes a reference to its existing
//! entry instead of being copied, which bounds the walk by the number of
//! distinct composites. Nesting is tracked on the heap, so deep chains
//! cannot exhaust the call stack.
//!
//! Identity is tracked in a call-scoped [`EncodeContext`]; the walker never
//! writes to the graph it reads.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as Json};

use crate::atom::AtomChain;
use crate::error::{CodecError, Result};
use crate::filter::FieldFilter;
use crate::markers::Markers;
use crate::registry::TypeRegistry;
use crate::table::Document;
use crate::value::{ArrayRef, ObjectRef, Value};

/// Scratch state of one encode call
#[derive(Debug, Default)]
pub struct EncodeContext {
    table: Vec<Json>,
    ids: HashMap<usize, usize>,
    /// Keeps every visited composite alive until the walk ends, so an
    /// address cannot be reused by a value a filter created and dropped.
    retained: Vec<Value>,
}

impl EncodeContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, address: usize) -> Option<usize> {
        self.ids.get(&address).copied()
    }

    fn allocate(&mut self, address: usize, composite: Value) -> usize {
        let id = self.table.len();
        self.table.push(Json::Null);
        self.ids.insert(address, id);
        self.retained.push(composite);
        id
    }

    fn fill(&mut self, id: usize, entry: Json) {
        self.table[id] = entry;
    }

    /// Number of allocated entries
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check if nothing was allocated
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Walks one value graph into a [`Document`]
pub struct Walker<'a> {
    markers: &'a Markers,
    atoms: &'a AtomChain,
    registry: &'a TypeRegistry,
    filter: &'a FieldFilter,
    revive_types: bool,
    ctx: EncodeContext,
}

impl<'a> Walker<'a> {
    /// Create a walker with a fresh context
    pub fn new(
        markers: &'a Markers,
        atoms: &'a AtomChain,
        registry: &'a TypeRegistry,
        filter: &'a FieldFilter,
        revive_types: bool,
    ) -> Self {
        Self {
            markers,
            atoms,
            registry,
            filter,
            revive_types,
            ctx: EncodeContext::new(),
        }
    }

    /// Encode a root value
    ///
    /// Atom roots become the whole document; composite roots produce the
    /// node table.
    pub fn walk(mut self, root: &Value) -> Result<Document> {
        if root.is_atom() {
            return Ok(Document::Atom(self.atoms.encode(root, self.markers)?));
        }
        self.visit(root)?;
        log::debug!("Walked graph into {} table entries", self.ctx.len());
        Ok(Document::Table(self.ctx.table))
    }

    /// Encode one value: atoms through the chain, composites into the table
    ///
    /// Composites are walked with an explicit stack of open entries, so
    /// nesting depth is bounded by memory rather than the call stack.
    pub fn visit(&mut self, value: &Value) -> Result<Json> {
        let mut stack = match self.open(value)? {
            Step::Done(encoded) => return Ok(encoded),
            Step::Open(frame) => vec![frame],
        };
        let mut encoded = Json::Null;

        while let Some(frame) = stack.last_mut() {
            match frame.next_child(self.markers, self.filter)? {
                Some(child) => match self.open(&child)? {
                    Step::Done(leaf) => frame.accept(leaf),
                    Step::Open(next) => stack.push(next),
                },
                None => {
                    let Some(done) = stack.pop() else { break };
                    let (id, entry) = done.finish();
                    self.ctx.fill(id, entry);
                    let reference = self.markers.reference(id);
                    match stack.last_mut() {
                        Some(parent) => parent.accept(reference),
                        None => encoded = reference,
                    }
                }
            }
        }
        Ok(encoded)
    }

    /// Start a value: atoms and known composites finish at once, new
    /// composites get the next id and an open entry
    fn open(&mut self, value: &Value) -> Result<Step> {
        match value {
            Value::Object(object) => self.open_object(object),
            Value::Array(array) => self.open_array(array),
            atom => Ok(Step::Done(self.atoms.encode(atom, self.markers)?)),
        }
    }

    fn open_object(&mut self, object: &ObjectRef) -> Result<Step> {
        let address = Arc::as_ptr(object) as *const () as usize;
        if let Some(id) = self.ctx.lookup(address) {
            return Ok(Step::Done(self.markers.reference(id)));
        }
        let id = self.ctx.allocate(address, Value::Object(object.clone()));
        log::trace!("Allocated table entry {} for object", id);

        // Snapshot under a short lock; the walk may come back to this object.
        let guard = object.read();
        let tag = if self.revive_types {
            self.registry.name_of(&guard)?
        } else {
            None
        };
        if let (Some(name), Some(live)) = (&tag, guard.behavior()) {
            self.registry.verify(name, live)?;
        }
        let fields: Vec<(String, Value)> =
            guard.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        drop(guard);

        let mut entry = Map::new();
        if let Some(name) = tag {
            entry.insert(self.markers.tag_key().to_string(), Json::String(name));
        }
        Ok(Step::Open(Frame::Object {
            id,
            fields: fields.into_iter(),
            entry,
            key: None,
        }))
    }

    fn open_array(&mut self, array: &ArrayRef) -> Result<Step> {
        let address = Arc::as_ptr(array) as *const () as usize;
        if let Some(id) = self.ctx.lookup(address) {
            return Ok(Step::Done(self.markers.reference(id)));
        }
        let id = self.ctx.allocate(address, Value::Array(array.clone()));
        log::trace!("Allocated table entry {} for array", id);

        let items = array.read().clone();
        Ok(Step::Open(Frame::Array {
            id,
            entry: Vec::with_capacity(items.len()),
            items: items.into_iter(),
        }))
    }
}

enum Step {
    Done(Json),
    Open(Frame),
}

/// A table entry whose children are still being encoded
enum Frame {
    Object {
        id: usize,
        fields: std::vec::IntoIter<(String, Value)>,
        entry: Map<String, Json>,
        /// Key waiting for the child currently being encoded
        key: Option<String>,
    },
    Array {
        id: usize,
        items: std::vec::IntoIter<Value>,
        entry: Vec<Json>,
    },
}

impl Frame {
    /// Next child to encode, after reserved key checks and filtering
    fn next_child(&mut self, markers: &Markers, filter: &FieldFilter) -> Result<Option<Value>> {
        match self {
            Self::Object { fields, key, .. } => {
                for (name, value) in fields.by_ref() {
                    if name == markers.tag_key() {
                        return Err(CodecError::ReservedKey(name));
                    }
                    if let Some(value) = filter.apply(&name, &value) {
                        *key = Some(name);
                        return Ok(Some(value));
                    }
                }
                Ok(None)
            }
            Self::Array { items, .. } => Ok(items.next()),
        }
    }

    /// Store the encoding of the child returned by the last `next_child`
    fn accept(&mut self, encoded: Json) {
        match self {
            Self::Object { entry, key, .. } => {
                if let Some(name) = key.take() {
                    entry.insert(name, encoded);
                }
            }
            Self::Array { entry, .. } => entry.push(encoded),
        }
    }

    fn finish(self) -> (usize, Json) {
        match self {
            Self::Object { id, entry, .. } => (id, Json::Object(entry)),
            Self::Array { id, entry, .. } => (id, Json::Array(entry)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Behavior;
    use serde_json::json;

    struct Fixture {
        markers: Markers,
        atoms: AtomChain,
        registry: TypeRegistry,
        filter: FieldFilter,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                markers: Markers::new("#"),
                atoms: AtomChain::standard(),
                registry: TypeRegistry::new(),
                filter: FieldFilter::Keep,
            }
        }

        fn walk(&self, value: &Value) -> Result<Document> {
            Walker::new(&self.markers, &self.atoms, &self.registry, &self.filter, true).walk(value)
        }
    }

    #[test]
    fn test_atom_root() {
        let doc = Fixture::new().walk(&Value::from(5.0)).unwrap();
        assert_eq!(doc, Document::Atom(json!(5)));
    }

    #[test]
    fn test_preorder_numbering() {
        let leaf = Value::object_from([("n", 1.0)]);
        let root = Value::object_from([("a", leaf.clone()), ("b", Value::array(vec![leaf]))]);

        let doc = Fixture::new().walk(&root).unwrap();
        assert_eq!(
            doc,
            Document::Table(vec![
                json!({ "a": { "#": 1 }, "b": { "#": 2 } }),
                json!({ "n": 1 }),
                json!([{ "#": 1 }]),
            ])
        );
    }

    #[test]
    fn test_self_cycle() {
        let a = Value::array(Vec::new());
        a.push(a.clone()).unwrap();

        let doc = Fixture::new().walk(&a).unwrap();
        assert_eq!(doc, Document::Table(vec![json!([{ "#": 0 }])]));
    }

    #[test]
    fn test_graph_left_untouched() {
        let root = Value::object_from([("x", 1.0)]);
        root.set("me", root.clone()).unwrap();

        Fixture::new().walk(&root).unwrap();

        let object = root.as_object().unwrap().read();
        let mut keys: Vec<&String> = object.iter().map(|(k, _)| k).collect();
        keys.sort();
        assert_eq!(keys, vec!["me", "x"]);
    }

    #[test]
    fn test_type_tag_written() {
        let mut fx = Fixture::new();
        let point = Behavior::new("Point");
        fx.registry.register(point.clone()).unwrap();

        let p = Value::instance(point);
        p.set("x", 1.0).unwrap();

        let doc = fx.walk(&p).unwrap();
        assert_eq!(doc, Document::Table(vec![json!({ "#": "Point", "x": 1 })]));
    }

    #[test]
    fn test_reserved_key_rejected() {
        let root = Value::object_from([("#", 1.0)]);
        assert!(matches!(
            Fixture::new().walk(&root),
            Err(CodecError::ReservedKey(_))
        ));
    }

    #[test]
    fn test_filter_skips_subgraph() {
        let mut fx = Fixture::new();
        fx.filter = FieldFilter::deny(["hidden"]);

        let root = Value::object_from([("hidden", Value::object()), ("shown", Value::object())]);
        let doc = fx.walk(&root).unwrap();

        // The filtered subgraph is never allocated
        assert_eq!(
            doc,
            Document::Table(vec![json!({ "shown": { "#": 1 } }), json!({})])
        );
    }

    #[test]
    fn test_filter_created_composites_stay_distinct() {
        let mut fx = Fixture::new();
        fx.filter = FieldFilter::replacer(|_, _| Some(Value::object()));

        let root = Value::object_from([("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        match fx.walk(&root).unwrap() {
            Document::Table(table) => assert_eq!(table.len(), 4),
            other => panic!("expected table, got {:?}", other),
        }
    }
}
