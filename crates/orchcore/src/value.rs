//! Path access over JSON values.

use std::fmt;

pub use serde_json::Value;

/// One accessor in a dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    /// A numeric segment; `raw` keeps its spelling for object keys like `"01"`
    Index { index: usize, raw: String },
}

impl PathSegment {
    /// Segments made only of ASCII digits index sequences, anything else names a key.
    pub fn parse(segment: &str) -> Self {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = segment.parse() {
                return PathSegment::Index {
                    index,
                    raw: segment.to_string(),
                };
            }
        }
        PathSegment::Key(segment.to_string())
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) | PathSegment::Index { raw: key, .. } => f.write_str(key),
        }
    }
}

/// Walk `path` through nested objects and arrays.
///
/// An index segment applied to an object reads the key spelled exactly as
/// written, so `{"01": ..}` is reachable through `.01`.
pub fn lookup<'a>(value: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match (current, segment) {
        (Value::Object(map), PathSegment::Key(key))
        | (Value::Object(map), PathSegment::Index { raw: key, .. }) => map.get(key),
        (Value::Array(items), PathSegment::Index { index, .. }) => items.get(*index),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> Vec<PathSegment> {
        raw.split('.').map(PathSegment::parse).collect()
    }

    #[test]
    fn numeric_segments_index_arrays() {
        let value = json!({"resources": [{"sku": "Y1"}, {"sku": "S0"}]});
        assert_eq!(lookup(&value, &path("resources.1.sku")), Some(&json!("S0")));
        assert_eq!(lookup(&value, &path("resources.2.sku")), None);
    }

    #[test]
    fn numeric_segments_keep_spelling_on_objects() {
        let value = json!({"codes": {"01": "x", "1": "y"}});
        assert_eq!(lookup(&value, &path("codes.01")), Some(&json!("x")));
        assert_eq!(lookup(&value, &path("codes.1")), Some(&json!("y")));
        assert_eq!(lookup(&value, &path("codes.001")), None);
        assert_eq!(PathSegment::parse("007").to_string(), "007");
    }

    #[test]
    fn scalars_have_no_children() {
        assert_eq!(lookup(&json!({"a": 3}), &path("a.b")), None);
        assert_eq!(lookup(&json!("text"), &path("0")), None);
    }
}
