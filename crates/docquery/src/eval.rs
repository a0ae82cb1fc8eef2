//! Predicate evaluator.
//!
//! Walks a [`CompiledQuery`] against one record. Boolean evaluation
//! short-circuits per group; scored evaluation visits every node of a single
//! `$and` group and sums the boosts of the nodes that pass.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::clause::{Condition, Group, Node, Operand};
use crate::compile::CompiledQuery;
use crate::error::{BoxError, CompileError, EvalError, Result};
use crate::kind::Kind;
use crate::op::{Compound, Test};
use crate::path::PathGetter;
use crate::traits::Record;

type GetterFn<R> = dyn Fn(&R, &str) -> std::result::Result<Option<Value>, BoxError> + Send + Sync;

/// How attribute values are read off a record.
///
/// A condition compiled from a dotted key (or `$computed`) always uses its
/// own path getter; the getter here applies to every other condition.
pub enum Getter<R: ?Sized> {
    /// Plain lookup through [`Record::attribute`].
    Property,
    /// Caller function receiving the record and the key.
    Func(Arc<GetterFn<R>>),
    /// Named accessor dispatched through [`Record::invoke`].
    Method(String),
}

impl<R: ?Sized> Getter<R> {
    /// Wraps a getter function.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&R, &str) -> std::result::Result<Option<Value>, BoxError> + Send + Sync + 'static,
    {
        Getter::Func(Arc::new(f))
    }

    /// Names the accessor method records are asked to invoke.
    pub fn method(name: impl Into<String>) -> Self {
        Getter::Method(name.into())
    }
}

impl<R: ?Sized> Default for Getter<R> {
    fn default() -> Self {
        Getter::Property
    }
}

impl<R: ?Sized> Clone for Getter<R> {
    fn clone(&self) -> Self {
        match self {
            Getter::Property => Getter::Property,
            Getter::Func(f) => Getter::Func(Arc::clone(f)),
            Getter::Method(name) => Getter::Method(name.clone()),
        }
    }
}

impl<R: ?Sized> fmt::Debug for Getter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Getter::Property => f.write_str("Property"),
            Getter::Func(_) => f.write_str("Func(..)"),
            Getter::Method(name) => f.debug_tuple("Method").field(name).finish(),
        }
    }
}

/// Reads the attribute a condition tests.
///
/// The condition's own path getter wins, then the caller's getter, then
/// [`Record::attribute`].
pub fn resolve_attribute<'r, R: Record>(
    condition: &Condition,
    record: &'r R,
    getter: &Getter<R>,
) -> std::result::Result<Option<Cow<'r, Value>>, EvalError> {
    read_attribute(&condition.key, condition.getter.as_ref(), record, getter)
}

pub(crate) fn read_attribute<'r, R: Record>(
    key: &str,
    path: Option<&PathGetter>,
    record: &'r R,
    getter: &Getter<R>,
) -> std::result::Result<Option<Cow<'r, Value>>, EvalError> {
    if let Some(path) = path {
        return Ok(path.resolve(record));
    }
    match getter {
        Getter::Property => Ok(record.attribute(key)),
        Getter::Func(f) => f(record, key)
            .map(|value| value.map(Cow::Owned))
            .map_err(|source| EvalError::Getter {
                key: key.to_string(),
                source,
            }),
        Getter::Method(name) => record.invoke(name, key).map(|value| value.map(Cow::Owned)),
    }
}

/// Tests a record against a compiled query.
///
/// Every top-level group must pass.
pub fn evaluate<R: Record>(query: &CompiledQuery, record: &R, getter: &Getter<R>) -> Result<bool> {
    Ok(matches_all(query, record, getter)?)
}

/// Scores a record against a compiled query.
///
/// The query must consist of exactly one `$and` group. Every node of that
/// group is evaluated; the result is the boost of the passing nodes divided
/// by the boost of all nodes, so it lies in `[0, 1]`. An empty group scores 0.
pub fn evaluate_scored<R: Record>(
    query: &CompiledQuery,
    record: &R,
    getter: &Getter<R>,
) -> Result<f64> {
    let group = scored_group(query)?;

    let mut total = 0.0;
    let mut passed = 0.0;
    for node in &group.nodes {
        let boost = node.boost();
        total += boost;
        if eval_node(node, record, getter)? {
            passed += boost;
        }
    }
    Ok(if total == 0.0 { 0.0 } else { passed / total })
}

fn scored_group(query: &CompiledQuery) -> std::result::Result<&Group, CompileError> {
    match query.groups() {
        [group] if group.kind == Compound::And => Ok(group),
        groups => {
            let found = if groups.is_empty() {
                "no groups".to_string()
            } else {
                groups
                    .iter()
                    .map(|group| group.kind.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            Err(CompileError::ScoreRequiresSingleAnd { found })
        }
    }
}

pub(crate) fn matches_all<R: Record>(
    query: &CompiledQuery,
    record: &R,
    getter: &Getter<R>,
) -> std::result::Result<bool, EvalError> {
    for group in query.groups() {
        if !eval_group(group, record, getter)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn eval_group<R: Record>(
    group: &Group,
    record: &R,
    getter: &Getter<R>,
) -> std::result::Result<bool, EvalError> {
    for node in &group.nodes {
        let passed = eval_node(node, record, getter)?;
        match group.kind {
            Compound::And if !passed => return Ok(false),
            Compound::Or if passed => return Ok(true),
            Compound::Not | Compound::Nor if passed => return Ok(false),
            _ => {}
        }
    }
    Ok(group.kind != Compound::Or)
}

fn eval_node<R: Record>(
    node: &Node,
    record: &R,
    getter: &Getter<R>,
) -> std::result::Result<bool, EvalError> {
    match node {
        Node::Condition(condition) => eval_condition(condition, record, getter),
        Node::Group(group) => eval_group(group, record, getter),
    }
}

fn eval_condition<R: Record>(
    condition: &Condition,
    record: &R,
    getter: &Getter<R>,
) -> std::result::Result<bool, EvalError> {
    let attr = resolve_attribute(condition, record, getter)?;
    let attr = attr.as_deref();

    if !condition.op.admits(Kind::of_attribute(attr)) {
        return Ok(false);
    }

    match (condition.op.entry().test, &condition.operand) {
        (Test::Leaf(test), operand) => Ok(test(operand, attr)),
        (Test::Callback, Operand::Callback(callback)) => callback
            .call(record as &dyn Record, attr)
            .map_err(EvalError::Callback),
        (Test::ElemMatch, Operand::Query(query)) => {
            let Some(Value::Array(items)) = attr else {
                return Ok(false);
            };
            let property = Getter::Property;
            for item in items {
                if matches_all(query, item, &property)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Ok(false),
    }
}
