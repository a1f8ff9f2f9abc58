//! Runtime values for the graph codec
//!
//! A [`Value`] is either an atom (primitive or special terminal value) or a
//! composite handle. Composites are shared, mutable and compared by identity,
//! so the same object may appear many times in a graph, including inside
//! itself.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use time::OffsetDateTime;

use crate::registry::Behavior;

/// Shared handle to an object composite
pub type ObjectRef = Arc<RwLock<Object>>;

/// Shared handle to an array composite
pub type ArrayRef = Arc<RwLock<Vec<Value>>>;

/// A value in an object graph
#[derive(Clone)]
pub enum Value {
    /// Absent value
    Undefined,
    /// Null value
    Null,
    /// Boolean
    Bool(bool),
    /// Number (64-bit float, may be non-finite)
    Number(f64),
    /// String
    String(String),
    /// Point in time
    Date(OffsetDateTime),
    /// Pattern matcher (source + flags)
    Pattern(Pattern),
    /// Host environment node
    Host(HostNode),
    /// Native callable, never serializable
    Function(NativeFunction),
    /// Object composite
    Object(ObjectRef),
    /// Array composite
    Array(ArrayRef),
}

impl Value {
    /// Create a new empty plain object
    pub fn object() -> Self {
        Self::Object(Arc::new(RwLock::new(Object::new())))
    }

    /// Create an object from key/value pairs
    pub fn object_from<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut object = Object::new();
        for (k, v) in fields {
            object.insert(k, v.into());
        }
        Self::Object(Arc::new(RwLock::new(object)))
    }

    /// Create an empty object bound to a behavior
    pub fn instance(behavior: Behavior) -> Self {
        Self::Object(Arc::new(RwLock::new(Object::with_behavior(behavior))))
    }

    /// Create an array composite
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Arc::new(RwLock::new(items)))
    }

    /// Check if this value is an atom (anything but an object or array)
    pub fn is_atom(&self) -> bool {
        !self.is_composite()
    }

    /// Check if this value is an object or array
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Array(_))
    }

    /// Check if value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Identity comparison for composites, equality for atoms
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b),
            (Self::Object(_) | Self::Array(_), _) | (_, Self::Object(_) | Self::Array(_)) => false,
            _ => self == other,
        }
    }

    /// Get type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Pattern(_) => "pattern",
            Self::Host(_) => "host",
            Self::Function(_) => "function",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the object handle
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Try to get the array handle
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get a field of an object (cloned out of the lock)
    pub fn get(&self, key: &str) -> Option<Value> {
        self.as_object()?.read().get(key).cloned()
    }

    /// Get an element of an array (cloned out of the lock)
    pub fn at(&self, index: usize) -> Option<Value> {
        self.as_array()?.read().get(index).cloned()
    }

    /// Set a field on an object. Returns `None` if this is not an object.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<()> {
        self.as_object()?.write().insert(key, value.into());
        Some(())
    }

    /// Append to an array. Returns `None` if this is not an array.
    pub fn push(&self, value: impl Into<Value>) -> Option<()> {
        self.as_array()?.write().push(value.into());
        Some(())
    }

    /// Number of fields or elements of a composite
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Object(o) => Some(o.read().len()),
            Self::Array(a) => Some(a.read().len()),
            _ => None,
        }
    }

    /// Behavior bound to an object, if any
    pub fn behavior(&self) -> Option<Behavior> {
        self.as_object()?.read().behavior().cloned()
    }

    /// Invoke a method of the object's bound behavior
    ///
    /// Returns `None` if this is not an object, has no behavior, or the
    /// behavior has no method with that name.
    pub fn call_method(&self, name: &str, args: &[Value]) -> Option<Value> {
        let object = self.as_object()?;
        // Release the lock before calling; methods read and write `this`.
        let method = object.read().behavior()?.method(name)?.clone();
        Some(method(object, args))
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Undefined
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a == b,
            (Self::Host(a), Self::Host(b)) => a.markup() == b.markup(),
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(&a.func, &b.func),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Composites print shallow: graphs may be cyclic.
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Date(d) => write!(f, "Date({})", d),
            Self::Pattern(p) => write!(f, "{}", p),
            Self::Host(h) => write!(f, "Host({:?})", h.0),
            Self::Function(func) => write!(f, "{:?}", func),
            Self::Object(o) => match o.try_read() {
                Some(guard) => write!(f, "Object({:p}, {} fields)", Arc::as_ptr(o), guard.len()),
                None => write!(f, "Object({:p}, locked)", Arc::as_ptr(o)),
            },
            Self::Array(a) => match a.try_read() {
                Some(guard) => write!(f, "Array({:p}, {} items)", Arc::as_ptr(a), guard.len()),
                None => write!(f, "Array({:p}, locked)", Arc::as_ptr(a)),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(v as f64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<OffsetDateTime> for Value {
    fn from(v: OffsetDateTime) -> Self {
        Self::Date(v)
    }
}

impl From<Pattern> for Value {
    fn from(v: Pattern) -> Self {
        Self::Pattern(v)
    }
}

impl From<HostNode> for Value {
    fn from(v: HostNode) -> Self {
        Self::Host(v)
    }
}

impl From<NativeFunction> for Value {
    fn from(v: NativeFunction) -> Self {
        Self::Function(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::array(v)
    }
}

/// Object composite: named fields plus an optional behavior binding
#[derive(Clone, Default)]
pub struct Object {
    fields: BTreeMap<String, Value>,
    behavior: Option<Behavior>,
}

impl Object {
    /// Create a plain object
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object bound to a behavior
    pub fn with_behavior(behavior: Behavior) -> Self {
        Self {
            fields: BTreeMap::new(),
            behavior: Some(behavior),
        }
    }

    /// Bound behavior, `None` for plain records
    pub fn behavior(&self) -> Option<&Behavior> {
        self.behavior.as_ref()
    }

    /// Rebind (or unbind) the behavior
    pub fn set_behavior(&mut self, behavior: Option<Behavior>) {
        self.behavior = behavior;
    }

    /// Get a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a field, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    /// Remove a field
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Check if a field exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Iterate over fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the object has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("behavior", &self.behavior)
            .finish()
    }
}

/// A pattern matcher in source/flags form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    source: String,
    flags: String,
}

impl Pattern {
    /// Create a pattern from its source and flags
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            flags: flags.into(),
        }
    }

    /// Parse the literal form `/source/flags`
    pub fn parse(literal: &str) -> Option<Self> {
        let body = literal.strip_prefix('/')?;
        let end = body.rfind('/')?;
        let (source, flags) = (&body[..end], &body[end + 1..]);
        if !flags.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some(Self::new(source, flags))
    }

    /// Pattern source
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Pattern flags
    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Compile into a regex. Flags `i`, `m`, `s` and `x` map to the
    /// matching builder options; other flags only affect matching strategy.
    pub fn compile(&self) -> Result<Regex, regex::Error> {
        let mut builder = RegexBuilder::new(&self.source);
        builder.case_insensitive(self.flags.contains('i'));
        builder.multi_line(self.flags.contains('m'));
        builder.dot_matches_new_line(self.flags.contains('s'));
        builder.ignore_whitespace(self.flags.contains('x'));
        builder.build()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

/// An object provided by the host environment (e.g. a document node)
pub trait HostObject: fmt::Debug + Send + Sync {
    /// Markup serialization of the node
    fn markup(&self) -> String;

    /// Get as Any reference (for downcasting)
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a host object
#[derive(Clone)]
pub struct HostNode(Arc<dyn HostObject>);

impl HostNode {
    /// Wrap a host object
    pub fn new(object: impl HostObject + 'static) -> Self {
        Self(Arc::new(object))
    }

    /// Markup serialization of the node
    pub fn markup(&self) -> String {
        self.0.markup()
    }

    /// Downcast to a concrete host object
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref()
    }
}

impl fmt::Debug for HostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostNode({:?})", self.0)
    }
}

/// Host object that only carries its markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupNode {
    markup: String,
}

impl MarkupNode {
    /// Create from markup
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
        }
    }
}

impl HostObject for MarkupNode {
    fn markup(&self) -> String {
        self.markup.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Native function type
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Native/built-in function
#[derive(Clone)]
pub struct NativeFunction {
    /// Function name
    pub name: String,
    func: NativeFn,
}

impl NativeFunction {
    /// Create a native function
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Call the function
    pub fn call(&self, args: &[Value]) -> Value {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native {}>", self.name)
    }
}
