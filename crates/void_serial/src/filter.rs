//! Field filters
//!
//! A filter sees every caller-visible object field before it is encoded and
//! either keeps it (possibly replaced) or omits it. Array elements and
//! engine-internal keys never reach a filter.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Replacer hook: `Some(value)` keeps the field with that value, `None` omits it
pub type Replacer = Arc<dyn Fn(&str, &Value) -> Option<Value> + Send + Sync>;

/// Default number of decimal digits kept by [`FieldFilter::precision`]
pub const DEFAULT_PRECISION: u32 = 3;

/// Filter applied to object fields during encoding
#[derive(Clone, Default)]
pub enum FieldFilter {
    /// Keep every field unchanged
    #[default]
    Keep,
    /// Arbitrary replacer hook
    Replacer(Replacer),
    /// Keep only the listed keys
    AllowList(BTreeSet<String>),
}

impl FieldFilter {
    /// Filter from a replacer closure
    pub fn replacer<F>(f: F) -> Self
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self::Replacer(Arc::new(f))
    }

    /// Filter keeping only the given keys
    pub fn allow<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllowList(keys.into_iter().map(Into::into).collect())
    }

    /// Filter dropping the given keys
    pub fn deny<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let denied: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        Self::replacer(move |key, value| (!denied.contains(key)).then(|| value.clone()))
    }

    /// Round finite numbers to `digits` decimals, unless rounding would turn
    /// a nonzero number into zero
    pub fn precision(digits: u32) -> Self {
        Self::replacer(move |_, value| match value {
            Value::Number(n) => Some(Value::Number(round_nonzero(*n, digits))),
            other => Some(other.clone()),
        })
    }

    /// Apply the filter to one field
    pub fn apply(&self, key: &str, value: &Value) -> Option<Value> {
        match self {
            Self::Keep => Some(value.clone()),
            Self::Replacer(f) => f(key, value),
            Self::AllowList(keys) => keys.contains(key).then(|| value.clone()),
        }
    }
}

impl fmt::Debug for FieldFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => write!(f, "Keep"),
            Self::Replacer(_) => write!(f, "Replacer(..)"),
            Self::AllowList(keys) => f.debug_tuple("AllowList").field(keys).finish(),
        }
    }
}

fn round_nonzero(n: f64, digits: u32) -> f64 {
    if !n.is_finite() {
        return n;
    }
    let scale = 10f64.powi(digits as i32);
    // Halves round toward positive infinity
    let rounded = (n * scale + 0.5).floor() / scale;
    if rounded == 0.0 && n != 0.0 {
        n
    } else {
        rounded
    }
}
