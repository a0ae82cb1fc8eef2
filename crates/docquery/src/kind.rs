//! Runtime type classification for query values and attribute values.

use std::fmt;

use serde_json::Value;

use crate::value::QueryValue;

/// Runtime kind of a value.
///
/// The compiler branches on the kind of each clause value, and the
/// evaluator's type guards check the kind of each resolved attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    /// Attribute is missing altogether.
    Undefined,
    Boolean,
    Number,
    String,
    Array,
    Object,
    RegExp,
    Date,
    Function,
}

impl Kind {
    /// Classifies a query value.
    pub fn of_query(value: &QueryValue) -> Kind {
        match value {
            QueryValue::Null => Kind::Null,
            QueryValue::Bool(_) => Kind::Boolean,
            QueryValue::Number(_) => Kind::Number,
            QueryValue::String(_) => Kind::String,
            QueryValue::Array(_) => Kind::Array,
            QueryValue::Object(_) => Kind::Object,
            QueryValue::Regex(_) => Kind::RegExp,
            QueryValue::Date(_) => Kind::Date,
            QueryValue::Function(_) => Kind::Function,
        }
    }

    /// Classifies a resolved attribute; `None` is [`Kind::Undefined`].
    pub fn of_attribute(value: Option<&Value>) -> Kind {
        match value {
            None => Kind::Undefined,
            Some(Value::Null) => Kind::Null,
            Some(Value::Bool(_)) => Kind::Boolean,
            Some(Value::Number(_)) => Kind::Number,
            Some(Value::String(_)) => Kind::String,
            Some(Value::Array(_)) => Kind::Array,
            Some(Value::Object(_)) => Kind::Object,
        }
    }

    /// Returns `true` for `Null` and `Undefined`.
    pub fn is_nullish(self) -> bool {
        matches!(self, Kind::Null | Kind::Undefined)
    }

    /// Lowercase name, as matched by `$type`.
    ///
    /// Unlike JavaScript's `typeof`, arrays are `"array"` and null is
    /// `"null"`, so neither matches `"object"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Undefined => "undefined",
            Kind::Boolean => "boolean",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Object => "object",
            Kind::RegExp => "regexp",
            Kind::Date => "date",
            Kind::Function => "function",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a query value. Shorthand for [`Kind::of_query`].
pub fn classify(value: &QueryValue) -> Kind {
    Kind::of_query(value)
}
