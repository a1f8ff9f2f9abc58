//! Builder namespace
//!
//! Builder encodings name their constructor by a dotted path (`"Date"`,
//! `"host.Node"`). The namespace is a tree of scopes; each path segment but
//! the last selects a child scope and the last names the builder.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use std::num::NonZeroU8;

use serde_json::Value as Json;
use time::format_description::well_known::iso8601::{Config, EncodedConfig, TimePrecision};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

use crate::error::{CodecError, Result};
use crate::value::{Pattern, Value};

/// Constructor invoked with the stored argument list
///
/// Returning `None` decodes to `Null`.
pub type Builder = Arc<dyn Fn(&[Json]) -> Result<Option<Value>> + Send + Sync>;

/// Builder name for dates
pub const DATE: &str = "Date";
/// Builder name for pattern matchers
pub const REGEXP: &str = "RegExp";
/// Builder name for non-finite numbers
pub const NUMBER: &str = "Number";

/// ISO-8601 with a signed six digit year and millisecond precision
const EXTENDED_YEAR: EncodedConfig = Config::DEFAULT
    .set_year_is_six_digits(true)
    .set_time_precision(TimePrecision::Second {
        decimal_digits: NonZeroU8::new(3),
    })
    .encode();

/// Render a date as a UTC ISO-8601 string
///
/// Years 0 to 9999 use RFC 3339; any other year uses the extended form
/// `-000001-06-01T00:00:00.000Z`.
pub fn format_date(date: OffsetDateTime) -> Result<String> {
    let utc = date.to_offset(UtcOffset::UTC);
    let formatted = if (0..=9999).contains(&utc.year()) {
        utc.format(&Rfc3339)
    } else {
        utc.format(&Iso8601::<EXTENDED_YEAR>)
    };
    formatted.map_err(|e| CodecError::UnsupportedValue(format!("date {}: {}", date, e)))
}

/// Parse either form written by [`format_date`]
pub fn parse_date(iso: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(iso, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(iso, &Iso8601::PARSING))
        .map_err(|e| CodecError::malformed(format!("invalid date '{}': {}", iso, e)))
}

/// Tree of builders addressed by dotted paths
#[derive(Clone, Default)]
pub struct Namespace {
    builders: BTreeMap<String, Builder>,
    children: BTreeMap<String, Namespace>,
}

impl Namespace {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace with the `Date`, `RegExp` and `Number` builders
    pub fn standard() -> Self {
        let mut ns = Self::new();
        ns.register(DATE, build_date);
        ns.register(REGEXP, build_pattern);
        ns.register(NUMBER, build_number);
        ns
    }

    /// Register a builder under a dotted path, replacing any previous one
    pub fn register<F>(&mut self, path: &str, builder: F) -> &mut Self
    where
        F: Fn(&[Json]) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        let mut segments: Vec<&str> = path.split('.').collect();
        let leaf = segments.pop().unwrap_or_default();
        let mut scope = &mut *self;
        for segment in segments {
            scope = scope.children.entry(segment.to_string()).or_default();
        }
        scope.builders.insert(leaf.to_string(), Arc::new(builder));
        self
    }

    /// Resolve a dotted path to its builder
    pub fn resolve(&self, path: &str) -> Result<&Builder> {
        let mut segments: Vec<&str> = path.split('.').collect();
        let leaf = segments.pop().unwrap_or_default();
        let mut scope = self;
        for segment in segments {
            scope = scope
                .children
                .get(segment)
                .ok_or_else(|| CodecError::UnknownType(path.to_string()))?;
        }
        scope
            .builders
            .get(leaf)
            .ok_or_else(|| CodecError::UnknownType(path.to_string()))
    }

    /// Check if a path resolves
    pub fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }

    /// Run the builder at `path`
    ///
    /// An array `args` is the argument list; any other value is passed as
    /// the single argument.
    pub fn build(&self, path: &str, args: &Json) -> Result<Value> {
        let builder = self.resolve(path)?;
        let args = match args {
            Json::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };
        log::trace!("Building '{}' from {} argument(s)", path, args.len());
        Ok(builder(args)?.unwrap_or(Value::Null))
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("builders", &self.builders.keys().collect::<Vec<_>>())
            .field("children", &self.children)
            .finish()
    }
}

fn build_date(args: &[Json]) -> Result<Option<Value>> {
    let date = match args.first() {
        Some(Json::String(iso)) => parse_date(iso)?,
        Some(Json::Number(ms)) => {
            let ms = ms.as_f64().unwrap_or(0.0);
            OffsetDateTime::from_unix_timestamp_nanos((ms * 1_000_000.0) as i128)
                .map_err(|e| CodecError::malformed(format!("date out of range: {}", e)))?
        }
        other => {
            return Err(CodecError::malformed(format!("invalid date argument: {:?}", other)));
        }
    };
    Ok(Some(Value::Date(date)))
}

fn build_pattern(args: &[Json]) -> Result<Option<Value>> {
    let source = args
        .first()
        .and_then(Json::as_str)
        .ok_or_else(|| CodecError::malformed("pattern source must be a string"))?;
    let flags = args.get(1).and_then(Json::as_str).unwrap_or_default();
    Ok(Some(Value::Pattern(Pattern::new(source, flags))))
}

fn build_number(args: &[Json]) -> Result<Option<Value>> {
    let n = match args.first() {
        Some(Json::Number(n)) => n.as_f64(),
        Some(Json::String(s)) => parse_number(s),
        _ => None,
    };
    // Zero is falsy and unwraps to nothing; NaN is kept so it round-trips
    Ok(n.filter(|n| *n != 0.0).map(Value::Number))
}

/// Parse the string forms a number renders to, including non-finite ones
fn parse_number(s: &str) -> Option<f64> {
    match s.trim() {
        "NaN" => Some(f64::NAN),
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dotted_resolution() {
        let mut ns = Namespace::new();
        ns.register("host.dom.Node", |args| {
            Ok(args.first().and_then(Json::as_str).map(Value::from))
        });

        assert!(ns.contains("host.dom.Node"));
        assert!(!ns.contains("host.dom"));
        assert!(!ns.contains("Node"));
        assert!(matches!(ns.resolve("host.Node"), Err(CodecError::UnknownType(_))));
        assert_eq!(ns.build("host.dom.Node", &json!("<p/>")).unwrap(), Value::from("<p/>"));
    }

    #[test]
    fn test_standard_builders() {
        let ns = Namespace::standard();

        let date = ns.build(DATE, &json!("2021-03-04T05:06:07.089Z")).unwrap();
        match date {
            Value::Date(d) => {
                assert_eq!(d.year(), 2021);
                assert_eq!(d.millisecond(), 89);
            }
            other => panic!("expected date, got {:?}", other),
        }

        let pattern = ns.build(REGEXP, &json!(["a+b", "gi"])).unwrap();
        assert_eq!(pattern, Value::Pattern(Pattern::new("a+b", "gi")));
    }

    #[test]
    fn test_number_builder() {
        let ns = Namespace::standard();
        assert!(ns.build(NUMBER, &json!("NaN")).unwrap().as_f64().unwrap().is_nan());
        assert_eq!(ns.build(NUMBER, &json!("Infinity")).unwrap(), Value::Number(f64::INFINITY));
        assert_eq!(ns.build(NUMBER, &json!("-Infinity")).unwrap(), Value::Number(f64::NEG_INFINITY));
        assert_eq!(ns.build(NUMBER, &json!("2.5")).unwrap(), Value::Number(2.5));
        // Unparseable input unwraps to nothing
        assert_eq!(ns.build(NUMBER, &json!("garbage")).unwrap(), Value::Null);
    }

    #[test]
    fn test_falsy_number_is_null() {
        let ns = Namespace::standard();
        assert_eq!(ns.build(NUMBER, &json!("0")).unwrap(), Value::Null);
        assert_eq!(ns.build(NUMBER, &json!("-0")).unwrap(), Value::Null);
        assert_eq!(ns.build(NUMBER, &json!("")).unwrap(), Value::Null);
        assert_eq!(ns.build(NUMBER, &json!(0)).unwrap(), Value::Null);
    }

    #[test]
    fn test_extended_year_dates() {
        let ancient = time::macros::datetime!(-0001-06-01 00:00 UTC);
        let text = format_date(ancient).unwrap();
        assert_eq!(text, "-000001-06-01T00:00:00.000Z");
        assert_eq!(parse_date(&text).unwrap(), ancient);

        let modern = time::macros::datetime!(2021-03-04 05:06:07 UTC);
        assert_eq!(format_date(modern).unwrap(), "2021-03-04T05:06:07Z");

        let ns = Namespace::standard();
        assert_eq!(ns.build(DATE, &json!(text)).unwrap(), Value::Date(ancient));
    }

    #[test]
    fn test_bad_builder_arguments() {
        let ns = Namespace::standard();
        assert!(matches!(
            ns.build(DATE, &json!("yesterday")),
            Err(CodecError::MalformedEncoding(_))
        ));
        assert!(matches!(
            ns.build(REGEXP, &json!([1, 2])),
            Err(CodecError::MalformedEncoding(_))
        ));
    }
}
