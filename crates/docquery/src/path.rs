//! Dotted attribute paths.
//!
//! A path such as `"items.price"` is split once at compile time. Walking it
//! broadcasts across arrays: when the current value is a list, the rest of
//! the path is applied to every element and the results are collected into
//! a new list.

use std::borrow::Cow;

use serde_json::Value;

use crate::traits::Record;

/// A compiled dotted path.
///
/// # Example
///
/// ```
/// use docquery::make_getter;
/// use serde_json::json;
///
/// let getter = make_getter("a.b");
/// let record = json!({"a": [{"b": 1}, {"b": 2}]});
/// assert_eq!(getter.resolve(&record).unwrap().into_owned(), json!([1, 2]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathGetter {
    path: String,
    segments: Vec<String>,
}

impl PathGetter {
    /// Splits `path` on `.`.
    pub fn new(path: &str) -> Self {
        PathGetter {
            path: path.to_string(),
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    /// The original dotted path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Reads the path off `record`.
    ///
    /// Returns `None` when any intermediate value is missing, null, or a
    /// scalar. Inside a broadcast, missing branches become `null` entries.
    pub fn resolve<'r, R: Record + ?Sized>(&self, record: &'r R) -> Option<Cow<'r, Value>> {
        let (first, rest) = self.segments.split_first()?;
        let head = record.attribute(first)?;
        lookup(rest, head)
    }
}

/// Compiles a dotted path into a getter.
pub fn make_getter(path: &str) -> PathGetter {
    PathGetter::new(path)
}

fn lookup<'r>(segments: &[String], value: Cow<'r, Value>) -> Option<Cow<'r, Value>> {
    let Some((segment, rest)) = segments.split_first() else {
        return Some(value);
    };
    match value {
        Cow::Borrowed(Value::Array(items)) => Some(Cow::Owned(broadcast(segments, items))),
        Cow::Owned(Value::Array(items)) => Some(Cow::Owned(broadcast(segments, &items))),
        Cow::Borrowed(Value::Object(map)) => lookup(rest, Cow::Borrowed(map.get(segment)?)),
        Cow::Owned(Value::Object(mut map)) => lookup(rest, Cow::Owned(map.remove(segment)?)),
        _ => None,
    }
}

fn broadcast(segments: &[String], items: &[Value]) -> Value {
    Value::Array(
        items
            .iter()
            .map(|item| {
                lookup(segments, Cow::Borrowed(item))
                    .map(Cow::into_owned)
                    .unwrap_or(Value::Null)
            })
            .collect(),
    )
}
