//! The canonical document tree and the normalizer that produces it.
//!
//! Everything downstream of decoding works on [`Value`], a closed tagged union
//! whose mappings are always keyed by strings. YAML decoders happily produce
//! mappings keyed by integers, floats or booleans (`200:` under `responses` is
//! the classic case), so decoded trees are passed through [`Normalize`] first.

use serde_json::{Map, Number};

/// A canonical, string-keyed document tree.
pub use serde_json::Value;

/// Key used for mapping keys that have no sensible string form.
pub const INVALID_KEY: &str = "(invalid)";

/// Conversion of a decoder's native tree into the canonical [`Value`].
///
/// Normalization is total: it never fails, and keys that cannot be rendered
/// become [`INVALID_KEY`].
pub trait Normalize {
    fn normalize(self) -> Value;
}

impl Normalize for Value {
    fn normalize(self) -> Value {
        self
    }
}

impl Normalize for serde_yaml::Value {
    fn normalize(self) -> Value {
        match self {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => normalize_number(&n),
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(items) => {
                Value::Array(items.into_iter().map(Normalize::normalize).collect())
            }
            serde_yaml::Value::Mapping(mapping) => {
                let mut out = Map::with_capacity(mapping.len());
                for (key, value) in mapping {
                    out.insert(stringify_key(&key), value.normalize());
                }
                Value::Object(out)
            }
            serde_yaml::Value::Tagged(tagged) => tagged.value.normalize(),
        }
    }
}

/// Normalize any supported decoder tree.
pub fn normalize<T: Normalize>(raw: T) -> Value {
    raw.normalize()
}

/// Render a mapping key as a string.
///
/// Strings pass through, integers render in base 10, floats use the shortest
/// representation that round-trips, booleans render as `true`/`false`, and
/// everything else becomes [`INVALID_KEY`].
pub fn stringify_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else if let Some(f) = n.as_f64() {
                float_key(f)
            } else {
                INVALID_KEY.to_string()
            }
        }
        _ => INVALID_KEY.to_string(),
    }
}

fn float_key(f: f64) -> String {
    if f == f64::INFINITY {
        "+Inf".to_string()
    } else if f == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        f.to_string()
    }
}

fn normalize_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(Number::from(i))
    } else if let Some(u) = n.as_u64() {
        Value::Number(Number::from(u))
    } else {
        // NaN and infinities have no JSON number form.
        n.as_f64()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number)
    }
}

/// Short name of a value's variant, used in diagnostics.
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
