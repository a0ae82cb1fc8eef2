//! Query-side value types.
//!
//! Records are plain [`serde_json::Value`]s, but query documents need a few
//! things JSON cannot express: compiled regular expressions, dates, and
//! callbacks. [`QueryValue`] is the closed set of everything a clause may
//! hold, and [`Document`] is an insertion-ordered mapping of them.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{BoxError, CompileError};
use crate::traits::Record;

/// A value appearing in a query document.
#[derive(Debug, Clone)]
pub enum QueryValue {
    /// JSON `null`.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Numeric literal.
    Number(Number),
    /// String literal.
    String(String),
    /// Array literal.
    Array(Vec<QueryValue>),
    /// Nested mapping: an operator object, a sub-query, or a literal.
    Object(Document),
    /// Regular expression literal.
    Regex(Regex),
    /// Date literal.
    Date(Timestamp),
    /// Callback, used by `$cb`.
    Function(Callback),
}

impl QueryValue {
    /// Compiles `pattern` into a regex literal.
    pub fn regex(pattern: &str) -> Result<Self, CompileError> {
        Ok(QueryValue::Regex(Regex::new(pattern)?))
    }

    /// Wraps a closure as a `$cb` callback value.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&dyn Record, Option<&Value>) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        QueryValue::Function(Callback::new(f))
    }

    /// Returns `true` for `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }

    /// Returns `true` for a NaN number.
    pub fn is_nan(&self) -> bool {
        matches!(self, QueryValue::Number(Number::F64(n)) if n.is_nan())
    }

    /// Extracts the string value, if present.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extracts the number value, if present.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            QueryValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extracts the array elements, if present.
    pub fn as_array(&self) -> Option<&[QueryValue]> {
        match self {
            QueryValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Extracts the nested document, if present.
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            QueryValue::Object(doc) => Some(doc),
            _ => None,
        }
    }
}

impl PartialEq for QueryValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (QueryValue::Null, QueryValue::Null) => true,
            (QueryValue::Bool(a), QueryValue::Bool(b)) => a == b,
            (QueryValue::Number(a), QueryValue::Number(b)) => a == b,
            (QueryValue::String(a), QueryValue::String(b)) => a == b,
            (QueryValue::Array(a), QueryValue::Array(b)) => a == b,
            (QueryValue::Object(a), QueryValue::Object(b)) => a == b,
            (QueryValue::Regex(a), QueryValue::Regex(b)) => a.as_str() == b.as_str(),
            (QueryValue::Date(a), QueryValue::Date(b)) => a == b,
            (QueryValue::Function(a), QueryValue::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Null => write!(f, "null"),
            QueryValue::Bool(b) => write!(f, "{b}"),
            QueryValue::Number(n) => write!(f, "{n}"),
            QueryValue::String(s) => write!(f, "{s:?}"),
            QueryValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            QueryValue::Object(doc) => write!(f, "{doc}"),
            QueryValue::Regex(re) => write!(f, "/{}/", re.as_str()),
            QueryValue::Date(ts) => write!(f, "Date({})", ts.as_millis()),
            QueryValue::Function(_) => write!(f, "<function>"),
        }
    }
}

impl From<Value> for QueryValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => QueryValue::Null,
            Value::Bool(b) => QueryValue::Bool(b),
            Value::Number(n) => QueryValue::Number(Number::from_json(&n)),
            Value::String(s) => QueryValue::String(s),
            Value::Array(items) => {
                QueryValue::Array(items.into_iter().map(QueryValue::from).collect())
            }
            Value::Object(map) => QueryValue::Object(Document::from(map)),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::String(s.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue::String(s)
    }
}

impl From<bool> for QueryValue {
    fn from(b: bool) -> Self {
        QueryValue::Bool(b)
    }
}

impl From<Number> for QueryValue {
    fn from(n: Number) -> Self {
        QueryValue::Number(n)
    }
}

impl From<i32> for QueryValue {
    fn from(n: i32) -> Self {
        QueryValue::Number(Number::from(n))
    }
}

impl From<i64> for QueryValue {
    fn from(n: i64) -> Self {
        QueryValue::Number(Number::from(n))
    }
}

impl From<u64> for QueryValue {
    fn from(n: u64) -> Self {
        QueryValue::Number(Number::from(n))
    }
}

impl From<f64> for QueryValue {
    fn from(n: f64) -> Self {
        QueryValue::Number(Number::from(n))
    }
}

impl From<Regex> for QueryValue {
    fn from(re: Regex) -> Self {
        QueryValue::Regex(re)
    }
}

impl From<Timestamp> for QueryValue {
    fn from(ts: Timestamp) -> Self {
        QueryValue::Date(ts)
    }
}

impl From<Callback> for QueryValue {
    fn from(cb: Callback) -> Self {
        QueryValue::Function(cb)
    }
}

impl From<Document> for QueryValue {
    fn from(doc: Document) -> Self {
        QueryValue::Object(doc)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(items: Vec<T>) -> Self {
        QueryValue::Array(items.into_iter().map(Into::into).collect())
    }
}

/// An insertion-ordered query document.
///
/// Key order is preserved because it decides evaluation order among
/// conditions of equal precedence.
///
/// # Example
///
/// ```
/// use docquery::{Document, QueryValue};
/// use serde_json::json;
///
/// let doc = Document::from_json(json!({"age": {"$gte": 18}})).unwrap();
/// assert!(doc.contains_key("age"));
///
/// let doc = Document::new()
///     .with("name", QueryValue::regex("^Jo").unwrap())
///     .with("age", 30);
/// assert_eq!(doc.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document(IndexMap<String, QueryValue>);

impl Document {
    /// Creates an empty document (matches everything).
    pub fn new() -> Self {
        Document::default()
    }

    /// Converts a JSON object into a document.
    pub fn from_json(value: Value) -> Result<Self, CompileError> {
        match value {
            Value::Object(map) => Ok(Document::from(map)),
            other => Err(CompileError::ExpectedDocument(other.to_string())),
        }
    }

    /// Adds a key, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a key, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.get(key)
    }

    /// Removes `key`, preserving the order of the remaining keys.
    pub fn remove(&mut self, key: &str) -> Option<QueryValue> {
        self.0.shift_remove(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{key:?}:{value}")?;
        }
        write!(f, "}}")
    }
}

impl From<serde_json::Map<String, Value>> for Document {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Document(
            map.into_iter()
                .map(|(k, v)| (k, QueryValue::from(v)))
                .collect(),
        )
    }
}

impl TryFrom<Value> for Document {
    type Error = CompileError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Document::from_json(value)
    }
}

impl FromIterator<(String, QueryValue)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, QueryValue)>>(iter: I) -> Self {
        Document(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        Ok(Document::from(map))
    }
}

type CallbackFn = dyn Fn(&dyn Record, Option<&Value>) -> Result<bool, BoxError> + Send + Sync;

/// Caller-supplied test used by `$cb`.
///
/// Receives the record being tested and the resolved attribute (`None` when
/// the attribute is missing). Errors propagate out of the query run.
#[derive(Clone)]
pub struct Callback(Arc<CallbackFn>);

impl Callback {
    /// Wraps a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&dyn Record, Option<&Value>) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Callback(Arc::new(f))
    }

    /// Invokes the callback.
    pub fn call(&self, record: &dyn Record, attr: Option<&Value>) -> Result<bool, BoxError> {
        (self.0)(record, attr)
    }

    /// Returns `true` if both handles point at the same closure.
    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// Numeric value supporting all common numeric types.
///
/// Numbers are stored in one of three variants to preserve precision:
/// - `I64` for signed integers
/// - `U64` for unsigned integers
/// - `F64` for floating point
///
/// Comparisons between different numeric types are handled by converting
/// to the appropriate common type.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// 64-bit floating point.
    F64(f64),
}

impl Number {
    /// Converts a JSON number, keeping integers exact.
    pub fn from_json(n: &serde_json::Number) -> Self {
        if let Some(i) = n.as_i64() {
            Number::I64(i)
        } else if let Some(u) = n.as_u64() {
            Number::U64(u)
        } else {
            Number::F64(n.as_f64().unwrap_or(f64::NAN))
        }
    }

    /// Converts the number to f64 for comparison.
    pub fn to_f64(self) -> f64 {
        match self {
            Number::I64(n) => n as f64,
            Number::U64(n) => n as f64,
            Number::F64(n) => n,
        }
    }

    /// Compares two numbers, handling mixed types.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::I64(a), Number::I64(b)) => Some(a.cmp(&b)),
            (Number::U64(a), Number::U64(b)) => Some(a.cmp(&b)),
            (Number::F64(a), Number::F64(b)) => a.partial_cmp(&b),

            // Mixed type comparisons - convert to f64
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.compare(*other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(*other)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::I64(n) => write!(f, "{n}"),
            Number::U64(n) => write!(f, "{n}"),
            Number::F64(n) => write!(f, "{n}"),
        }
    }
}

impl From<i32> for Number {
    fn from(n: i32) -> Self {
        Number::I64(n as i64)
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::I64(n)
    }
}

impl From<u32> for Number {
    fn from(n: u32) -> Self {
        Number::U64(n as u64)
    }
}

impl From<u64> for Number {
    fn from(n: u64) -> Self {
        Number::U64(n)
    }
}

impl From<usize> for Number {
    fn from(n: usize) -> Self {
        Number::U64(n as u64)
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::F64(n)
    }
}

/// Timestamp value represented as milliseconds since Unix epoch.
///
/// Record attributes carry dates either as epoch milliseconds or as
/// RFC 3339 strings; both are read with [`Timestamp::from_attribute`].
///
/// # Example
///
/// ```
/// use docquery::Timestamp;
/// use serde_json::json;
///
/// let ts = Timestamp::from_attribute(&json!("1970-01-01T00:00:01Z")).unwrap();
/// assert_eq!(ts, Timestamp::from_secs(1));
/// assert_eq!(Timestamp::from_attribute(&json!(1000)), Some(Timestamp(1000)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a new timestamp from milliseconds since Unix epoch.
    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    /// Creates a new timestamp from seconds since Unix epoch.
    ///
    /// Saturates at the `i64` millisecond range.
    pub fn from_secs(secs: i64) -> Self {
        Timestamp(secs.saturating_mul(1000))
    }

    /// Parses an RFC 3339 date-time string.
    pub fn parse_rfc3339(s: &str) -> Option<Self> {
        chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Timestamp(dt.timestamp_millis()))
    }

    /// Reads a timestamp from a record attribute.
    pub fn from_attribute(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Timestamp),
            Value::String(s) => Timestamp::parse_rfc3339(s),
            _ => None,
        }
    }

    /// Returns the timestamp as milliseconds since Unix epoch.
    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns the timestamp as seconds since Unix epoch.
    pub fn as_secs(self) -> i64 {
        self.0 / 1000
    }
}

impl<Tz: chrono::TimeZone> From<chrono::DateTime<Tz>> for Timestamp {
    fn from(dt: chrono::DateTime<Tz>) -> Self {
        Timestamp(dt.timestamp_millis())
    }
}
