//! Type registry for behavior revival
//!
//! Maps registered type names to [`Behavior`] descriptors and back.
//! Registration is always explicit; names are never derived from Rust
//! type information, so documents stay portable between hosts.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{CodecError, Result};
use crate::value::{Object, ObjectRef, Value};

/// Method callable through a behavior
pub type Method = Arc<dyn Fn(&ObjectRef, &[Value]) -> Value + Send + Sync>;

/// Shared behavior descriptor attached to objects
///
/// Two behaviors are equal only if they are the same descriptor; a second
/// behavior with the same name is a different behavior.
#[derive(Clone)]
pub struct Behavior {
    inner: Arc<BehaviorInner>,
}

#[derive(Clone)]
struct BehaviorInner {
    name: Option<Box<str>>,
    methods: BTreeMap<Box<str>, Method>,
}

impl Behavior {
    /// Create a named behavior
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            inner: Arc::new(BehaviorInner {
                name: (!name.is_empty()).then(|| name.into_boxed_str()),
                methods: BTreeMap::new(),
            }),
        }
    }

    /// Create a behavior with no name
    pub fn anonymous() -> Self {
        Self::new("")
    }

    /// Add a method
    pub fn with_method<F>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(&ObjectRef, &[Value]) -> Value + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.inner)
            .methods
            .insert(name.into(), Arc::new(method));
        self
    }

    /// Registered name, `None` if anonymous
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Look up a method
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.inner.methods.get(name)
    }

    /// Check if both handles point to the same descriptor
    pub fn ptr_eq(&self, other: &Behavior) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Behavior {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("name", &self.name())
            .field("methods", &self.inner.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Central registry of revivable types
#[derive(Clone, Default)]
pub struct TypeRegistry {
    by_name: BTreeMap<String, Behavior>,
}

impl TypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a behavior under its own name
    ///
    /// Registering a name again replaces the previous binding.
    pub fn register(&mut self, behavior: Behavior) -> Result<&mut Self> {
        let name = behavior.name().ok_or(CodecError::AnonymousType)?.to_string();
        if self.by_name.insert(name.clone(), behavior).is_some() {
            log::debug!("Replaced behavior registered as '{}'", name);
        }
        Ok(self)
    }

    /// Name of the type an object declares
    ///
    /// `None` for plain records, `AnonymousType` if the object is bound to
    /// a behavior without a name.
    pub fn name_of(&self, object: &Object) -> Result<Option<String>> {
        match object.behavior() {
            None => Ok(None),
            Some(behavior) => behavior
                .name()
                .map(|name| Some(name.to_string()))
                .ok_or(CodecError::AnonymousType),
        }
    }

    /// Behavior registered under a name
    pub fn prototype_of(&self, name: &str) -> Result<Behavior> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| CodecError::UnknownType(name.to_string()))
    }

    /// Check that a live behavior is the one registered under `name`
    pub fn verify(&self, name: &str, live: &Behavior) -> Result<()> {
        if self.prototype_of(name)?.ptr_eq(live) {
            Ok(())
        } else {
            Err(CodecError::ConstructorMismatch(name.to_string()))
        }
    }

    /// Create an empty object bound to the behavior registered under `name`
    pub fn instantiate(&self, name: &str) -> Result<ObjectRef> {
        let behavior = self.prototype_of(name)?;
        Ok(Arc::new(RwLock::new(Object::with_behavior(behavior))))
    }

    /// Get a behavior by name
    pub fn get(&self, name: &str) -> Option<&Behavior> {
        self.by_name.get(name)
    }

    /// Check if a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Iterate over registered names and behaviors
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Behavior)> {
        self.by_name.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Get the number of registered types
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_registry() {
        let mut registry = TypeRegistry::new();
        let vec2 = Behavior::new("Vec2");
        registry.register(vec2.clone()).unwrap();

        assert!(registry.contains("Vec2"));
        assert_eq!(registry.len(), 1);
        assert!(registry.prototype_of("Vec2").unwrap().ptr_eq(&vec2));
    }

    #[test]
    fn test_anonymous_behavior() {
        let mut registry = TypeRegistry::new();
        assert!(matches!(
            registry.register(Behavior::anonymous()),
            Err(CodecError::AnonymousType)
        ));

        let object = Object::with_behavior(Behavior::anonymous());
        assert!(matches!(registry.name_of(&object), Err(CodecError::AnonymousType)));
        assert_eq!(registry.name_of(&Object::new()).unwrap(), None);
    }

    #[test]
    fn test_unknown_and_mismatch() {
        let mut registry = TypeRegistry::new();
        registry.register(Behavior::new("Foo")).unwrap();

        assert!(matches!(registry.prototype_of("Bar"), Err(CodecError::UnknownType(_))));
        assert!(matches!(
            registry.verify("Foo", &Behavior::new("Foo")),
            Err(CodecError::ConstructorMismatch(_))
        ));
    }

    #[test]
    fn test_instantiate_and_methods() {
        let counter = Behavior::new("Counter").with_method("bump", |this, _| {
            let mut this = this.write();
            let n = this.get("n").and_then(|v| v.as_f64()).unwrap_or(0.0) + 1.0;
            this.insert("n", Value::Number(n));
            Value::Number(n)
        });
        let mut registry = TypeRegistry::new();
        registry.register(counter).unwrap();

        let object = Value::Object(registry.instantiate("Counter").unwrap());
        assert_eq!(object.call_method("bump", &[]), Some(Value::Number(1.0)));
        assert_eq!(object.call_method("bump", &[]), Some(Value::Number(2.0)));
        assert_eq!(object.call_method("missing", &[]), None);
    }
}
