//! The [`Record`] trait: how the engine reads attributes off a record.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::error::EvalError;

/// Trait for types that can be queried.
///
/// `serde_json::Value` and `serde_json::Map` implement it out of the box.
/// Struct records implement [`Record::attribute`] by hand, which is also
/// where computed properties live: return an owned value for anything that
/// is not stored directly.
///
/// # Manual Implementation
///
/// ```
/// use std::borrow::Cow;
/// use docquery::Record;
/// use serde_json::{json, Value};
///
/// struct Task {
///     title: String,
///     estimate_hours: u32,
/// }
///
/// impl Record for Task {
///     fn attribute(&self, key: &str) -> Option<Cow<'_, Value>> {
///         match key {
///             "title" => Some(Cow::Owned(json!(self.title))),
///             "estimate_hours" => Some(Cow::Owned(json!(self.estimate_hours))),
///             "estimate_days" => Some(Cow::Owned(json!(self.estimate_hours / 8))),
///             _ => None,
///         }
///     }
/// }
///
/// let task = Task { title: "Ship".into(), estimate_hours: 16 };
/// assert_eq!(task.attribute("estimate_days").unwrap().as_ref(), &json!(2));
/// ```
pub trait Record {
    /// Returns the value of `key`, or `None` when the record has no such
    /// attribute.
    fn attribute(&self, key: &str) -> Option<Cow<'_, Value>>;

    /// Invokes a named accessor method with `key` as argument.
    ///
    /// Used by [`Getter::Method`](crate::Getter::Method). The default
    /// implementation knows no methods.
    fn invoke(&self, method: &str, key: &str) -> Result<Option<Value>, EvalError> {
        let _ = key;
        Err(EvalError::UnknownMethod(method.to_string()))
    }
}

impl Record for Value {
    fn attribute(&self, key: &str) -> Option<Cow<'_, Value>> {
        match self {
            Value::Object(map) => map.get(key).map(Cow::Borrowed),
            // Reading a key off a list reads it off every element.
            Value::Array(items) => Some(Cow::Owned(Value::Array(
                items
                    .iter()
                    .map(|item| {
                        item.attribute(key)
                            .map(Cow::into_owned)
                            .unwrap_or(Value::Null)
                    })
                    .collect(),
            ))),
            _ => None,
        }
    }
}

impl Record for Map<String, Value> {
    fn attribute(&self, key: &str) -> Option<Cow<'_, Value>> {
        self.get(key).map(Cow::Borrowed)
    }
}

impl<R: Record + ?Sized> Record for &R {
    fn attribute(&self, key: &str) -> Option<Cow<'_, Value>> {
        (**self).attribute(key)
    }

    fn invoke(&self, method: &str, key: &str) -> Result<Option<Value>, EvalError> {
        (**self).invoke(method, key)
    }
}

impl<R: Record + ?Sized> Record for Box<R> {
    fn attribute(&self, key: &str) -> Option<Cow<'_, Value>> {
        (**self).attribute(key)
    }

    fn invoke(&self, method: &str, key: &str) -> Result<Option<Value>, EvalError> {
        (**self).invoke(method, key)
    }
}
