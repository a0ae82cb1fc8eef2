//! Operator tags and the operator table.
//!
//! Each operator is described by one [`OpEntry`] row: its `$`-name, the
//! operand shape the compiler enforces, the attribute kind the evaluator
//! requires, and how the evaluator tests it. Adding an operator means adding
//! a row and, for plain operators, a test function in `clause.rs`.

use std::fmt;

use serde_json::Value;

use crate::clause::{self, Operand};
use crate::kind::Kind;
use crate::value::QueryValue;

/// Leaf operator tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Lt,
    Lte,
    Gt,
    Gte,
    Exists,
    Has,
    Type,
    Ne,
    Equal,
    Mod,
    Size,
    Between,
    BetweenE,
    StartsWith,
    EndsWith,
    Like,
    LikeI,
    Contains,
    In,
    Nin,
    All,
    Any,
    None,
    Cb,
    Regex,
    RegExp,
    DeepEqual,
    ElemMatch,
    Date,
    Computed,
}

/// Logical combinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compound {
    And,
    Not,
    Or,
    Nor,
}

/// Operand shape checked when a query is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Anything except a function.
    Any,
    Array,
    Number,
    String,
    /// Regex literal or pattern string.
    Pattern,
    /// Two-element array.
    Pair,
    Function,
    Document,
}

/// Attribute kind required before an operator is tested.
///
/// A failing guard makes the condition false; it never raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Any,
    String,
    Array,
    StringOrArray,
    /// Present and not null.
    Defined,
}

/// Plain operator test over the compiled operand and the attribute.
pub type LeafTest = fn(&Operand, Option<&Value>) -> bool;

/// How the evaluator runs an operator.
#[derive(Clone, Copy)]
pub enum Test {
    Leaf(LeafTest),
    /// Calls the `$cb` callback with the record.
    Callback,
    /// Runs the embedded query over array elements.
    ElemMatch,
}

/// One row of the operator table.
#[derive(Clone, Copy)]
pub struct OpEntry {
    pub op: Op,
    pub name: &'static str,
    pub shape: Shape,
    pub guard: Guard,
    pub test: Test,
}

const fn row(op: Op, name: &'static str, shape: Shape, guard: Guard, test: Test) -> OpEntry {
    OpEntry {
        op,
        name,
        shape,
        guard,
        test,
    }
}

/// The operator table, in precedence order: cheap rejections first,
/// regex, structural and sub-query operators last.
pub static OPERATORS: [OpEntry; 30] = [
    row(Op::Lt, "$lt", Shape::Any, Guard::Any, Test::Leaf(clause::lt)),
    row(Op::Lte, "$lte", Shape::Any, Guard::Any, Test::Leaf(clause::lte)),
    row(Op::Gt, "$gt", Shape::Any, Guard::Any, Test::Leaf(clause::gt)),
    row(Op::Gte, "$gte", Shape::Any, Guard::Any, Test::Leaf(clause::gte)),
    row(Op::Exists, "$exists", Shape::Any, Guard::Any, Test::Leaf(clause::exists)),
    row(Op::Has, "$has", Shape::Any, Guard::Any, Test::Leaf(clause::exists)),
    row(Op::Type, "$type", Shape::Any, Guard::Any, Test::Leaf(clause::type_of)),
    row(Op::Ne, "$ne", Shape::Any, Guard::Any, Test::Leaf(clause::ne)),
    row(Op::Equal, "$equal", Shape::Any, Guard::Any, Test::Leaf(clause::equal)),
    row(Op::Mod, "$mod", Shape::Pair, Guard::Any, Test::Leaf(clause::modulo)),
    row(Op::Size, "$size", Shape::Number, Guard::StringOrArray, Test::Leaf(clause::size)),
    row(Op::Between, "$between", Shape::Pair, Guard::Any, Test::Leaf(clause::between)),
    row(Op::BetweenE, "$betweene", Shape::Pair, Guard::Any, Test::Leaf(clause::betweene)),
    row(Op::StartsWith, "$startsWith", Shape::String, Guard::String, Test::Leaf(clause::starts_with)),
    row(Op::EndsWith, "$endsWith", Shape::String, Guard::String, Test::Leaf(clause::ends_with)),
    row(Op::Like, "$like", Shape::String, Guard::String, Test::Leaf(clause::like)),
    row(Op::LikeI, "$likeI", Shape::String, Guard::String, Test::Leaf(clause::like_i)),
    row(Op::Contains, "$contains", Shape::Any, Guard::Array, Test::Leaf(clause::contains)),
    row(Op::In, "$in", Shape::Array, Guard::Defined, Test::Leaf(clause::is_in)),
    row(Op::Nin, "$nin", Shape::Array, Guard::Defined, Test::Leaf(clause::not_in)),
    row(Op::All, "$all", Shape::Array, Guard::Array, Test::Leaf(clause::all)),
    row(Op::Any, "$any", Shape::Array, Guard::Array, Test::Leaf(clause::any)),
    row(Op::None, "$none", Shape::Array, Guard::Array, Test::Leaf(clause::none)),
    row(Op::Cb, "$cb", Shape::Function, Guard::Any, Test::Callback),
    row(Op::Regex, "$regex", Shape::Pattern, Guard::String, Test::Leaf(clause::regex)),
    row(Op::RegExp, "$regexp", Shape::Pattern, Guard::String, Test::Leaf(clause::regex)),
    row(Op::DeepEqual, "$deepEqual", Shape::Any, Guard::Any, Test::Leaf(clause::deep_equal)),
    row(Op::ElemMatch, "$elemMatch", Shape::Document, Guard::Array, Test::ElemMatch),
    row(Op::Date, "$date", Shape::Any, Guard::Any, Test::Leaf(clause::same_instant)),
    // Replaced by the operator it wraps during compilation.
    row(Op::Computed, "$computed", Shape::Any, Guard::Any, Test::Leaf(clause::never)),
];

/// Precedence assigned to anything not in the fixed ordering.
const LAST: usize = usize::MAX;

impl Op {
    /// Looks up an operator by its `$`-name.
    pub fn from_name(name: &str) -> Option<Op> {
        OPERATORS.iter().find(|entry| entry.name == name).map(|entry| entry.op)
    }

    /// Returns this operator's table row.
    pub fn entry(self) -> &'static OpEntry {
        // Rows are declared in the same order as the enum variants.
        &OPERATORS[self as usize]
    }

    /// Returns the `$`-name of this operator.
    pub fn as_str(self) -> &'static str {
        self.entry().name
    }

    /// Sort key within a condition list.
    pub fn precedence(self) -> usize {
        match self {
            Op::Date | Op::Computed => LAST,
            other => other as usize,
        }
    }

    /// Returns `true` if `value` has the shape this operator expects.
    pub fn accepts(self, value: &QueryValue) -> bool {
        let kind = Kind::of_query(value);
        match self.entry().shape {
            Shape::Any => kind != Kind::Function,
            Shape::Array => kind == Kind::Array,
            Shape::Number => kind == Kind::Number,
            Shape::String => kind == Kind::String,
            Shape::Pattern => matches!(kind, Kind::RegExp | Kind::String),
            Shape::Pair => matches!(value, QueryValue::Array(items) if items.len() == 2),
            Shape::Function => kind == Kind::Function,
            Shape::Document => kind == Kind::Object,
        }
    }

    /// Returns `true` if the attribute kind satisfies this operator's guard.
    pub fn admits(self, attr: Kind) -> bool {
        match self.entry().guard {
            Guard::Any => true,
            Guard::String => attr == Kind::String,
            Guard::Array => attr == Kind::Array,
            Guard::StringOrArray => matches!(attr, Kind::String | Kind::Array),
            Guard::Defined => !attr.is_nullish(),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Compound {
    /// All combinators, in the order top-level groups are emitted.
    pub const ALL: [Compound; 4] = [Compound::And, Compound::Not, Compound::Or, Compound::Nor];

    /// Looks up a combinator by its `$`-name.
    pub fn from_name(name: &str) -> Option<Compound> {
        Compound::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Returns the `$`-name.
    pub fn as_str(self) -> &'static str {
        match self {
            Compound::And => "$and",
            Compound::Not => "$not",
            Compound::Or => "$or",
            Compound::Nor => "$nor",
        }
    }

    /// Whether the raw value must be a list of sub-queries.
    pub fn expects_array(self) -> bool {
        !matches!(self, Compound::Not)
    }

    /// Sort key; groups always follow leaf conditions.
    pub fn precedence(self) -> usize {
        let base = Op::ElemMatch as usize + 1;
        match self {
            Compound::Not => base,
            Compound::And => base + 1,
            Compound::Or => base + 2,
            Compound::Nor => base + 3,
        }
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Document;

    #[test]
    fn table_rows_match_variants() {
        for (index, entry) in OPERATORS.iter().enumerate() {
            assert_eq!(entry.op as usize, index, "row for {}", entry.name);
            assert_eq!(Op::from_name(entry.name), Some(entry.op));
        }
    }

    #[test]
    fn unknown_names() {
        assert_eq!(Op::from_name("$gtx"), None);
        assert_eq!(Op::from_name("gt"), None);
        assert_eq!(Compound::from_name("$and"), Some(Compound::And));
        assert_eq!(Compound::from_name("$xor"), None);
    }

    #[test]
    fn precedence_order() {
        assert!(Op::Lt.precedence() < Op::Equal.precedence());
        assert!(Op::Equal.precedence() < Op::Regex.precedence());
        assert!(Op::Regex.precedence() < Op::ElemMatch.precedence());
        assert!(Op::ElemMatch.precedence() < Compound::Not.precedence());
        assert!(Compound::Not.precedence() < Compound::And.precedence());
        assert!(Compound::Or.precedence() < Compound::Nor.precedence());
        assert!(Compound::Nor.precedence() < Op::Date.precedence());
    }

    #[test]
    fn operand_shapes() {
        assert!(Op::In.accepts(&QueryValue::from(vec![1, 2])));
        assert!(!Op::In.accepts(&QueryValue::from(1)));
        assert!(Op::Size.accepts(&QueryValue::from(3)));
        assert!(!Op::Size.accepts(&QueryValue::from("3")));
        assert!(Op::Regex.accepts(&QueryValue::from("a.*")));
        assert!(Op::Regex.accepts(&QueryValue::regex("a.*").unwrap()));
        assert!(!Op::Like.accepts(&QueryValue::from(1)));
        assert!(Op::Between.accepts(&QueryValue::from(vec![1, 2])));
        assert!(!Op::Mod.accepts(&QueryValue::from(vec![1, 2, 3])));
        assert!(Op::Cb.accepts(&QueryValue::callback(|_, _| Ok(true))));
        assert!(!Op::Equal.accepts(&QueryValue::callback(|_, _| Ok(true))));
        assert!(Op::ElemMatch.accepts(&QueryValue::Object(Document::new())));
    }

    #[test]
    fn attribute_guards() {
        assert!(Op::Like.admits(Kind::String));
        assert!(!Op::Like.admits(Kind::Number));
        assert!(Op::Size.admits(Kind::Array));
        assert!(Op::Size.admits(Kind::String));
        assert!(!Op::Contains.admits(Kind::String));
        assert!(!Op::In.admits(Kind::Undefined));
        assert!(!Op::Nin.admits(Kind::Null));
        assert!(Op::Equal.admits(Kind::Undefined));
    }

    #[test]
    fn compound_array_requirement() {
        assert!(Compound::And.expects_array());
        assert!(Compound::Or.expects_array());
        assert!(Compound::Nor.expects_array());
        assert!(!Compound::Not.expects_array());
    }
}
