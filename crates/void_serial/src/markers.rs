//! Engine-internal keys and the encodings built from them
//!
//! All internal keys derive from one prefix `P`:
//!
//! ```text
//! { "P": 3 }                       reference to table entry 3 (-1: undefined)
//! { "P.": "Date", "Pv": "..." }    builder: construct "Date" from the arguments
//! { "P": "Vec2", "x": 1 }          table entry tagged with a registered type
//! ```

use serde_json::{Map, Number, Value as Json};

/// Id standing for the undefined value in a reference encoding
pub const UNDEFINED_ID: i64 = -1;

/// Largest integer that survives a round trip through an f64
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Classification of a nested JSON object found in a table entry
#[derive(Debug, Clone, PartialEq)]
pub enum Encoding<'a> {
    /// Reference to a table index (or [`UNDEFINED_ID`])
    Reference(i64),
    /// Builder recipe
    Builder {
        /// Dotted namespace path of the builder
        name: &'a str,
        /// Stored argument(s)
        args: &'a Json,
    },
    /// Neither marker present (or markers of the wrong shape)
    Unknown,
}

/// Prefix-derived key set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    tag: String,
    builder: String,
    args: String,
}

impl Markers {
    /// Derive the key set from a prefix
    pub fn new(prefix: &str) -> Self {
        Self {
            tag: prefix.to_string(),
            builder: format!("{}.", prefix),
            args: format!("{}v", prefix),
        }
    }

    /// Key holding a reference id, and the type tag of a table entry
    pub fn tag_key(&self) -> &str {
        &self.tag
    }

    /// Key holding a builder name
    pub fn builder_key(&self) -> &str {
        &self.builder
    }

    /// Key holding builder arguments
    pub fn args_key(&self) -> &str {
        &self.args
    }

    /// `{ P: id }`
    pub fn reference(&self, id: usize) -> Json {
        let mut map = Map::new();
        map.insert(self.tag.clone(), Json::from(id as u64));
        Json::Object(map)
    }

    /// `{ P: -1 }`
    pub fn undefined(&self) -> Json {
        let mut map = Map::new();
        map.insert(self.tag.clone(), Json::from(UNDEFINED_ID));
        Json::Object(map)
    }

    /// `{ P.: name, Pv: args }`
    pub fn builder(&self, name: &str, args: Json) -> Json {
        let mut map = Map::new();
        map.insert(self.builder.clone(), Json::String(name.to_string()));
        map.insert(self.args.clone(), args);
        Json::Object(map)
    }

    /// Classify a nested object
    pub fn classify<'a>(&self, map: &'a Map<String, Json>) -> Encoding<'a> {
        if let Some(id) = map.get(&self.tag).and_then(Json::as_i64) {
            return Encoding::Reference(id);
        }
        if let Some(name) = map.get(&self.builder).and_then(Json::as_str) {
            return Encoding::Builder {
                name,
                args: map.get(&self.args).unwrap_or(&Json::Null),
            };
        }
        Encoding::Unknown
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_PREFIX)
    }
}

/// Render a finite number the way the text format expects: integral values
/// in the safe range as integers, everything else as a float.
pub fn json_number(n: f64) -> Option<Json> {
    if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        return Some(Json::from(n as i64));
    }
    Number::from_f64(n).map(Json::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_derived_keys() {
        let m = Markers::new("$");
        assert_eq!(m.tag_key(), "$");
        assert_eq!(m.builder_key(), "$.");
        assert_eq!(m.args_key(), "$v");
        assert_eq!(m.reference(4), json!({ "$": 4 }));
        assert_eq!(m.undefined(), json!({ "$": -1 }));
        assert_eq!(m.builder("Number", json!("NaN")), json!({ "$.": "Number", "$v": "NaN" }));
    }

    #[test]
    fn test_classify() {
        let m = Markers::new("#");
        let reference = json!({ "#": 2 });
        let builder = json!({ "#.": "RegExp", "#v": ["a", "g"] });
        let other = json!({ "x": 1 });
        let wrong_shape = json!({ "#": "2" });

        assert_eq!(m.classify(reference.as_object().unwrap()), Encoding::Reference(2));
        assert!(matches!(
            m.classify(builder.as_object().unwrap()),
            Encoding::Builder { name: "RegExp", .. }
        ));
        assert_eq!(m.classify(other.as_object().unwrap()), Encoding::Unknown);
        assert_eq!(m.classify(wrong_shape.as_object().unwrap()), Encoding::Unknown);
    }

    #[test]
    fn test_json_number() {
        assert_eq!(json_number(3.0), Some(json!(3)));
        assert_eq!(json_number(-0.0), Some(json!(0)));
        assert_eq!(json_number(1.5), Some(json!(1.5)));
        assert_eq!(json_number(1e300), Some(json!(1e300)));
        assert_eq!(json_number(f64::NAN), None);
    }
}
