//! Compiled query nodes and the plain operator tests.
//!
//! A [`Condition`] is a single attribute test: which attribute to read, the
//! operator, and the operand already validated and preprocessed by the
//! compiler. A [`Group`] combines nodes with `$and`, `$or`, `$nor` or `$not`.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

use crate::compile::CompiledQuery;
use crate::kind::Kind;
use crate::op::{Compound, Op};
use crate::path::PathGetter;
use crate::value::{Callback, Number, QueryValue, Timestamp};

/// A node of a compiled query.
#[derive(Debug, Clone)]
pub enum Node {
    Condition(Condition),
    Group(Group),
}

impl Node {
    /// Sort key used to order sibling nodes.
    pub fn precedence(&self) -> usize {
        match self {
            Node::Condition(cond) => cond.op.precedence(),
            Node::Group(group) => group.kind.precedence(),
        }
    }

    /// Scoring weight of this node.
    pub fn boost(&self) -> f64 {
        match self {
            Node::Condition(cond) => cond.boost,
            Node::Group(group) => group.boost,
        }
    }

    pub(crate) fn set_boost(&mut self, boost: f64) {
        match self {
            Node::Condition(cond) => cond.boost = boost,
            Node::Group(group) => group.boost = boost,
        }
    }
}

/// A single attribute test.
#[derive(Debug, Clone)]
pub struct Condition {
    /// Attribute name, used when no path getter is compiled.
    pub key: String,
    /// Compiled path, present when the key is dotted or `$computed` is used.
    pub getter: Option<PathGetter>,
    /// The operator.
    pub op: Op,
    /// The preprocessed operand.
    pub operand: Operand,
    /// Scoring weight, 1 unless `$boost` was given.
    pub boost: f64,
}

impl Condition {
    /// Creates a condition with the default boost.
    ///
    /// A dotted key gets a path getter.
    pub fn new(key: impl Into<String>, op: Op, operand: Operand) -> Self {
        let key = key.into();
        let getter = key.contains('.').then(|| PathGetter::new(&key));
        Condition {
            key,
            getter,
            op,
            operand,
            boost: 1.0,
        }
    }

    /// Runs this condition's plain test against an attribute.
    ///
    /// Applies the operator's type guard first. Callback and `$elemMatch`
    /// conditions need the evaluator and report `false` here.
    pub fn matches(&self, attr: Option<&Value>) -> bool {
        if !self.op.admits(Kind::of_attribute(attr)) {
            return false;
        }
        match self.op.entry().test {
            crate::op::Test::Leaf(test) => test(&self.operand, attr),
            _ => false,
        }
    }
}

/// A logical combination of nodes.
#[derive(Debug, Clone)]
pub struct Group {
    pub kind: Compound,
    pub nodes: Vec<Node>,
    pub boost: f64,
}

impl Group {
    /// Creates a group with the default boost.
    pub fn new(kind: Compound, nodes: Vec<Node>) -> Self {
        Group {
            kind,
            nodes,
            boost: 1.0,
        }
    }
}

/// Operand of a condition, in the form its operator consumes.
#[derive(Debug, Clone)]
pub enum Operand {
    /// Single value: equality, ordering, existence, `$type`, `$contains`.
    Value(QueryValue),
    /// Value list: `$in`, `$nin`, `$all`, `$any`, `$none`.
    List(Vec<QueryValue>),
    /// Bounds or divisor/remainder: `$between`, `$betweene`, `$mod`.
    Pair(QueryValue, QueryValue),
    /// Expected length: `$size`.
    Size(Number),
    /// Preprocessed text: `$like`, `$likeI`, `$startsWith`, `$endsWith`.
    Text(String),
    /// Compiled pattern: `$regex`, `$regexp`.
    Pattern(Regex),
    /// Caller test: `$cb`.
    Callback(Callback),
    /// Embedded query: `$elemMatch`.
    Query(Box<CompiledQuery>),
}

// ============================================================================
// Value comparison
// ============================================================================

/// Scalar equality between an attribute and a query value.
///
/// Numbers compare numerically across representations; dates compare
/// against epoch-millisecond or RFC 3339 attributes. Structured values are
/// never equal here.
pub fn strict_eq(attr: &Value, value: &QueryValue) -> bool {
    match (attr, value) {
        (Value::Null, QueryValue::Null) => true,
        (Value::Bool(a), QueryValue::Bool(b)) => a == b,
        (Value::Number(a), QueryValue::Number(b)) => Number::from_json(a) == *b,
        (Value::String(a), QueryValue::String(b)) => a == b,
        (attr, QueryValue::Date(ts)) => Timestamp::from_attribute(attr) == Some(*ts),
        _ => false,
    }
}

/// Structural equality between an attribute and a query value.
pub fn deep_eq(attr: &Value, value: &QueryValue) -> bool {
    match (attr, value) {
        (Value::Array(items), QueryValue::Array(expected)) => {
            items.len() == expected.len()
                && items.iter().zip(expected).all(|(a, b)| deep_eq(a, b))
        }
        (Value::Object(map), QueryValue::Object(doc)) => {
            map.len() == doc.len()
                && doc
                    .iter()
                    .all(|(key, expected)| map.get(key).is_some_and(|a| deep_eq(a, expected)))
        }
        _ => strict_eq(attr, value),
    }
}

/// Orders an attribute against a query value of a comparable kind.
pub fn compare(attr: &Value, value: &QueryValue) -> Option<Ordering> {
    match (attr, value) {
        (Value::Number(a), QueryValue::Number(b)) => Number::from_json(a).compare(*b),
        (Value::String(a), QueryValue::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (Value::Bool(a), QueryValue::Bool(b)) => Some(a.cmp(b)),
        (attr, QueryValue::Date(ts)) => Timestamp::from_attribute(attr).map(|a| a.cmp(ts)),
        _ => None,
    }
}

/// Lower-cases and reverses `s`, the form `$endsWith` compares in.
pub fn reverse_lower(s: &str) -> String {
    s.to_lowercase().chars().rev().collect()
}

fn contains_value(items: &[Value], value: &QueryValue) -> bool {
    items.iter().any(|item| deep_eq(item, value))
}

fn ordered(operand: &Operand, attr: Option<&Value>, accept: fn(Ordering) -> bool) -> bool {
    match (operand, attr) {
        (Operand::Value(value), Some(attr)) if !value.is_null() => {
            compare(attr, value).is_some_and(accept)
        }
        _ => false,
    }
}

fn bounded(operand: &Operand, attr: Option<&Value>, inclusive: bool) -> bool {
    let (Operand::Pair(low, high), Some(attr)) = (operand, attr) else {
        return false;
    };
    if low.is_null() || high.is_null() {
        return false;
    }
    let above = compare(attr, low);
    let below = compare(attr, high);
    if inclusive {
        above.is_some_and(Ordering::is_ge) && below.is_some_and(Ordering::is_le)
    } else {
        above == Some(Ordering::Greater) && below == Some(Ordering::Less)
    }
}

fn list_of<'a>(operand: &'a Operand) -> &'a [QueryValue] {
    match operand {
        Operand::List(values) => values,
        _ => &[],
    }
}

fn text_of(operand: &Operand) -> &str {
    match operand {
        Operand::Text(text) => text,
        _ => "",
    }
}

// ============================================================================
// Plain operator tests, referenced from the operator table
// ============================================================================

pub(crate) fn lt(operand: &Operand, attr: Option<&Value>) -> bool {
    ordered(operand, attr, Ordering::is_lt)
}

pub(crate) fn lte(operand: &Operand, attr: Option<&Value>) -> bool {
    ordered(operand, attr, Ordering::is_le)
}

pub(crate) fn gt(operand: &Operand, attr: Option<&Value>) -> bool {
    ordered(operand, attr, Ordering::is_gt)
}

pub(crate) fn gte(operand: &Operand, attr: Option<&Value>) -> bool {
    ordered(operand, attr, Ordering::is_ge)
}

pub(crate) fn exists(operand: &Operand, attr: Option<&Value>) -> bool {
    match operand {
        Operand::Value(QueryValue::Bool(expected)) => {
            attr.is_some_and(|a| !a.is_null()) == *expected
        }
        _ => false,
    }
}

pub(crate) fn type_of(operand: &Operand, attr: Option<&Value>) -> bool {
    match operand {
        Operand::Value(QueryValue::String(name)) => Kind::of_attribute(attr).as_str() == name,
        _ => false,
    }
}

pub(crate) fn ne(operand: &Operand, attr: Option<&Value>) -> bool {
    match operand {
        Operand::Value(value) => !attr.is_some_and(|a| deep_eq(a, value)),
        _ => false,
    }
}

pub(crate) fn equal(operand: &Operand, attr: Option<&Value>) -> bool {
    match (operand, attr) {
        (Operand::Value(value), Some(Value::Array(items))) => {
            items.iter().any(|item| strict_eq(item, value))
        }
        (Operand::Value(value), Some(attr)) => strict_eq(attr, value),
        _ => false,
    }
}

pub(crate) fn modulo(operand: &Operand, attr: Option<&Value>) -> bool {
    let (Operand::Pair(divisor, remainder), Some(Value::Number(n))) = (operand, attr) else {
        return false;
    };
    match (divisor.as_number(), remainder.as_number()) {
        (Some(divisor), Some(remainder)) => {
            Number::from_json(n).to_f64() % divisor.to_f64() == remainder.to_f64()
        }
        _ => false,
    }
}

pub(crate) fn size(operand: &Operand, attr: Option<&Value>) -> bool {
    let Operand::Size(expected) = operand else {
        return false;
    };
    let len = match attr {
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::Array(items)) => items.len(),
        _ => return false,
    };
    Number::from(len) == *expected
}

pub(crate) fn between(operand: &Operand, attr: Option<&Value>) -> bool {
    bounded(operand, attr, false)
}

pub(crate) fn betweene(operand: &Operand, attr: Option<&Value>) -> bool {
    bounded(operand, attr, true)
}

pub(crate) fn starts_with(operand: &Operand, attr: Option<&Value>) -> bool {
    match attr {
        Some(Value::String(s)) => s.to_lowercase().starts_with(text_of(operand)),
        _ => false,
    }
}

pub(crate) fn ends_with(operand: &Operand, attr: Option<&Value>) -> bool {
    match attr {
        Some(Value::String(s)) => reverse_lower(s).starts_with(text_of(operand)),
        _ => false,
    }
}

pub(crate) fn like(operand: &Operand, attr: Option<&Value>) -> bool {
    match attr {
        Some(Value::String(s)) => s.contains(text_of(operand)),
        _ => false,
    }
}

pub(crate) fn like_i(operand: &Operand, attr: Option<&Value>) -> bool {
    match attr {
        Some(Value::String(s)) => s.to_lowercase().contains(text_of(operand)),
        _ => false,
    }
}

pub(crate) fn contains(operand: &Operand, attr: Option<&Value>) -> bool {
    match (operand, attr) {
        (Operand::Value(value), Some(Value::Array(items))) => contains_value(items, value),
        _ => false,
    }
}

pub(crate) fn is_in(operand: &Operand, attr: Option<&Value>) -> bool {
    attr.is_some_and(|a| list_of(operand).iter().any(|value| deep_eq(a, value)))
}

pub(crate) fn not_in(operand: &Operand, attr: Option<&Value>) -> bool {
    attr.is_some_and(|a| !list_of(operand).iter().any(|value| deep_eq(a, value)))
}

pub(crate) fn all(operand: &Operand, attr: Option<&Value>) -> bool {
    match attr {
        Some(Value::Array(items)) => list_of(operand)
            .iter()
            .all(|value| contains_value(items, value)),
        _ => false,
    }
}

pub(crate) fn any(operand: &Operand, attr: Option<&Value>) -> bool {
    match attr {
        Some(Value::Array(items)) => list_of(operand)
            .iter()
            .any(|value| contains_value(items, value)),
        _ => false,
    }
}

pub(crate) fn none(operand: &Operand, attr: Option<&Value>) -> bool {
    match attr {
        Some(Value::Array(_)) => !any(operand, attr),
        _ => false,
    }
}

pub(crate) fn regex(operand: &Operand, attr: Option<&Value>) -> bool {
    match (operand, attr) {
        (Operand::Pattern(re), Some(Value::String(s))) => re.is_match(s),
        _ => false,
    }
}

pub(crate) fn deep_equal(operand: &Operand, attr: Option<&Value>) -> bool {
    match (operand, attr) {
        (Operand::Value(value), Some(attr)) => deep_eq(attr, value),
        _ => false,
    }
}

pub(crate) fn same_instant(operand: &Operand, attr: Option<&Value>) -> bool {
    match (operand, attr) {
        (Operand::Value(QueryValue::Date(ts)), Some(attr)) => {
            Timestamp::from_attribute(attr) == Some(*ts)
        }
        _ => false,
    }
}

pub(crate) fn never(_: &Operand, _: Option<&Value>) -> bool {
    false
}
