//! Atom codec chain
//!
//! Atoms never enter the node table. Each one is either written through
//! unchanged or rewritten into a builder/reference encoding by the first
//! codec in the chain that claims it.
//!
//! Standard order:
//!
//! 1. `function`   - callables, always rejected
//! 2. `host`       - host environment nodes (optional, see [`HostNodeCodec`])
//! 3. `date`       - `Date` builder with an ISO-8601 string
//! 4. `pattern`    - `RegExp` builder with `[source, flags]`
//! 5. `undefined`  - reference to id -1
//! 6. `non-finite` - `Number` builder with `"NaN"`, `"Infinity"`, `"-Infinity"`
//! 7. `plain`      - null, booleans, finite numbers and strings

use std::fmt;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::error::{CodecError, Result};
use crate::markers::{json_number, Markers};
use crate::namespace::{self, Namespace};
use crate::value::{HostNode, MarkupNode, Value};

/// One special-case encoder in the chain
pub trait AtomCodec: Send + Sync {
    /// Name used to find the codec in a chain
    fn name(&self) -> &str;

    /// Whether this codec owns the value
    fn matches(&self, value: &Value) -> bool;

    /// Encode a value this codec owns
    fn encode(&self, value: &Value, markers: &Markers) -> Result<Json>;
}

/// Rejects callables
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionCodec;

impl AtomCodec for FunctionCodec {
    fn name(&self) -> &str {
        "function"
    }

    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Function(_))
    }

    fn encode(&self, value: &Value, _markers: &Markers) -> Result<Json> {
        let name = match value {
            Value::Function(f) => f.name.as_str(),
            _ => "?",
        };
        Err(CodecError::UnsupportedValue(format!("function '{}'", name)))
    }
}

/// Parses markup back into a host node
pub type HostParser = Arc<dyn Fn(&str) -> HostNode + Send + Sync>;

/// Encodes host nodes as their markup, rebuilt by a namespace builder
#[derive(Clone)]
pub struct HostNodeCodec {
    builder: String,
    parse: HostParser,
}

impl HostNodeCodec {
    /// Default builder path for host nodes
    pub const DEFAULT_BUILDER: &'static str = "host.Node";

    /// Host codec with a custom builder path and parser
    pub fn new<F>(builder: impl Into<String>, parse: F) -> Self
    where
        F: Fn(&str) -> HostNode + Send + Sync + 'static,
    {
        Self {
            builder: builder.into(),
            parse: Arc::new(parse),
        }
    }

    /// Host codec producing [`MarkupNode`]s
    pub fn markup() -> Self {
        Self::new(Self::DEFAULT_BUILDER, |markup| HostNode::new(MarkupNode::new(markup)))
    }

    /// Builder path written into encodings
    pub fn builder_name(&self) -> &str {
        &self.builder
    }

    /// Register the matching builder in a namespace
    pub fn install(&self, ns: &mut Namespace) {
        let parse = self.parse.clone();
        ns.register(&self.builder, move |args| {
            let markup = args
                .first()
                .and_then(Json::as_str)
                .ok_or_else(|| CodecError::malformed("host node markup must be a string"))?;
            Ok(Some(Value::Host(parse(markup))))
        });
    }
}

impl AtomCodec for HostNodeCodec {
    fn name(&self) -> &str {
        "host"
    }

    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Host(_))
    }

    fn encode(&self, value: &Value, markers: &Markers) -> Result<Json> {
        match value {
            Value::Host(node) => Ok(markers.builder(&self.builder, Json::String(node.markup()))),
            other => Err(CodecError::UnsupportedValue(other.type_name().into())),
        }
    }
}

impl fmt::Debug for HostNodeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostNodeCodec")
            .field("builder", &self.builder)
            .finish()
    }
}

/// Dates as ISO-8601 strings in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct DateCodec;

impl AtomCodec for DateCodec {
    fn name(&self) -> &str {
        "date"
    }

    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Date(_))
    }

    fn encode(&self, value: &Value, markers: &Markers) -> Result<Json> {
        let Value::Date(date) = value else {
            return Err(CodecError::UnsupportedValue(value.type_name().into()));
        };
        let iso = namespace::format_date(*date)?;
        Ok(markers.builder(namespace::DATE, Json::String(iso)))
    }
}

/// Pattern matchers as `[source, flags]`
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternCodec;

impl AtomCodec for PatternCodec {
    fn name(&self) -> &str {
        "pattern"
    }

    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Pattern(_))
    }

    fn encode(&self, value: &Value, markers: &Markers) -> Result<Json> {
        let Value::Pattern(pattern) = value else {
            return Err(CodecError::UnsupportedValue(value.type_name().into()));
        };
        let args = Json::Array(vec![
            Json::String(pattern.source().to_string()),
            Json::String(pattern.flags().to_string()),
        ]);
        Ok(markers.builder(namespace::REGEXP, args))
    }
}

/// Undefined as a reference to the sentinel id
#[derive(Debug, Clone, Copy, Default)]
pub struct UndefinedCodec;

impl AtomCodec for UndefinedCodec {
    fn name(&self) -> &str {
        "undefined"
    }

    fn matches(&self, value: &Value) -> bool {
        value.is_undefined()
    }

    fn encode(&self, _value: &Value, markers: &Markers) -> Result<Json> {
        Ok(markers.undefined())
    }
}

/// NaN and infinities, which JSON cannot represent
#[derive(Debug, Clone, Copy, Default)]
pub struct NonFiniteCodec;

impl AtomCodec for NonFiniteCodec {
    fn name(&self) -> &str {
        "non-finite"
    }

    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Number(n) if !n.is_finite())
    }

    fn encode(&self, value: &Value, markers: &Markers) -> Result<Json> {
        let text = match value {
            Value::Number(n) if n.is_nan() => "NaN",
            Value::Number(n) if *n > 0.0 => "Infinity",
            Value::Number(_) => "-Infinity",
            other => return Err(CodecError::UnsupportedValue(other.type_name().into())),
        };
        Ok(markers.builder(namespace::NUMBER, Json::String(text.to_string())))
    }
}

/// Plain JSON atoms, written through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCodec;

impl AtomCodec for PlainCodec {
    fn name(&self) -> &str {
        "plain"
    }

    fn matches(&self, value: &Value) -> bool {
        matches!(
            value,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }

    fn encode(&self, value: &Value, _markers: &Markers) -> Result<Json> {
        match value {
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Number(n) => json_number(*n)
                .ok_or_else(|| CodecError::UnsupportedValue(format!("number {}", n))),
            Value::String(s) => Ok(Json::String(s.clone())),
            other => Err(CodecError::UnsupportedValue(other.type_name().into())),
        }
    }
}

/// Ordered list of atom codecs; the first match wins
#[derive(Clone)]
pub struct AtomChain {
    codecs: Vec<Arc<dyn AtomCodec>>,
}

impl AtomChain {
    /// Chain with no codecs
    pub fn empty() -> Self {
        Self { codecs: Vec::new() }
    }

    /// Standard chain without a host node codec
    pub fn standard() -> Self {
        Self::empty()
            .with(FunctionCodec)
            .with(DateCodec)
            .with(PatternCodec)
            .with(UndefinedCodec)
            .with(NonFiniteCodec)
            .with(PlainCodec)
    }

    /// Append a codec
    pub fn with(mut self, codec: impl AtomCodec + 'static) -> Self {
        self.codecs.push(Arc::new(codec));
        self
    }

    /// Insert a codec at a position (clamped to the chain length)
    pub fn insert(&mut self, index: usize, codec: impl AtomCodec + 'static) {
        let index = index.min(self.codecs.len());
        self.codecs.insert(index, Arc::new(codec));
    }

    /// Install a host codec right after the function codec, replacing any
    /// previous host codec
    pub fn with_host_nodes(mut self, codec: HostNodeCodec) -> Self {
        self.remove("host");
        let index = self
            .position("function")
            .map(|i| i + 1)
            .unwrap_or(0);
        self.insert(index, codec);
        self
    }

    /// Remove a codec by name
    pub fn without(mut self, name: &str) -> Self {
        self.remove(name);
        self
    }

    fn remove(&mut self, name: &str) {
        self.codecs.retain(|c| c.name() != name);
    }

    /// Position of a codec by name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.codecs.iter().position(|c| c.name() == name)
    }

    /// Codec names in priority order
    pub fn names(&self) -> Vec<&str> {
        self.codecs.iter().map(|c| c.name()).collect()
    }

    /// Encode an atom with the first codec that claims it
    pub fn encode(&self, value: &Value, markers: &Markers) -> Result<Json> {
        match self.codecs.iter().find(|c| c.matches(value)) {
            Some(codec) => codec.encode(value, markers),
            None => Err(CodecError::UnsupportedValue(format!(
                "no codec for {} value",
                value.type_name()
            ))),
        }
    }
}

impl Default for AtomChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for AtomChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomChain").field(&self.names()).finish()
    }
}
