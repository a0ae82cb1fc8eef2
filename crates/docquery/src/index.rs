//! Equality index pre-filter.
//!
//! An [`EqualityIndex`] maps each scalar value of one attribute to the
//! positions of the records holding it. Before a filter run, plain `$equal`
//! conditions on indexed keys are taken out of the top-level `$and` group and
//! answered from the indexes; only the surviving records are evaluated
//! against what is left of the query.

use std::collections::HashMap;

use serde_json::Value;

use crate::clause::{Node, Operand};
use crate::compile::CompiledQuery;
use crate::error::Result;
use crate::eval::{read_attribute, Getter};
use crate::op::{Compound, Op};
use crate::path::PathGetter;
use crate::traits::Record;
use crate::value::{Number, QueryValue};

/// Hashable form of a scalar value.
///
/// Numbers are keyed by their `f64` bits with `-0.0` folded into `0.0`, so
/// `1`, `1u64` and `1.0` share a key. NaN is never indexed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Null,
    Bool(bool),
    Number(u64),
    String(String),
}

impl IndexKey {
    /// Key for a scalar attribute value; `None` for arrays and objects.
    pub fn from_attribute(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(IndexKey::Null),
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Number(n) => number_key(Number::from_json(n)),
            Value::String(s) => Some(IndexKey::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Key for an `$equal` operand; `None` when the operand can't be looked up.
    ///
    /// Numbers at or beyond 2^53 in magnitude are not looked up.
    pub fn from_query(value: &QueryValue) -> Option<Self> {
        match value {
            QueryValue::Null => Some(IndexKey::Null),
            QueryValue::Bool(b) => Some(IndexKey::Bool(*b)),
            // Past 2^53 distinct integers share f64 bits.
            QueryValue::Number(n) if n.to_f64().abs() >= EXACT_LIMIT => None,
            QueryValue::Number(n) => number_key(*n),
            QueryValue::String(s) => Some(IndexKey::String(s.clone())),
            _ => None,
        }
    }
}

const EXACT_LIMIT: f64 = 9_007_199_254_740_992.0;

fn number_key(n: Number) -> Option<IndexKey> {
    let f = n.to_f64();
    if f.is_nan() {
        return None;
    }
    let f = if f == 0.0 { 0.0 } else { f };
    Some(IndexKey::Number(f.to_bits()))
}

/// Record positions grouped by the value of one attribute.
#[derive(Debug, Clone, Default)]
pub struct EqualityIndex {
    key: String,
    positions: HashMap<IndexKey, Vec<usize>>,
}

impl EqualityIndex {
    /// Indexes `records` by `key`.
    ///
    /// Dotted keys are read as paths; other keys go through `getter`. An
    /// array attribute is indexed under each of its scalar elements, the
    /// same membership rule `$equal` applies.
    pub fn build<R: Record>(key: &str, records: &[R], getter: &Getter<R>) -> Result<Self> {
        let path = key.contains('.').then(|| PathGetter::new(key));
        let mut positions: HashMap<IndexKey, Vec<usize>> = HashMap::new();

        for (pos, record) in records.iter().enumerate() {
            let Some(attr) = read_attribute(key, path.as_ref(), record, getter)? else {
                continue;
            };
            let keys: Vec<IndexKey> = match attr.as_ref() {
                Value::Array(items) => items.iter().filter_map(IndexKey::from_attribute).collect(),
                scalar => IndexKey::from_attribute(scalar).into_iter().collect(),
            };
            for index_key in keys {
                let slot = positions.entry(index_key).or_default();
                if slot.last() != Some(&pos) {
                    slot.push(pos);
                }
            }
        }

        tracing::debug!(
            key,
            records = records.len(),
            distinct = positions.len(),
            "built equality index"
        );
        Ok(EqualityIndex {
            key: key.to_string(),
            positions,
        })
    }

    /// The indexed attribute.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of distinct values seen.
    pub fn distinct(&self) -> usize {
        self.positions.len()
    }

    /// Ascending positions of the records equal to `value`.
    ///
    /// Returns `None` if `value` is not a scalar the index can answer for.
    pub fn lookup(&self, value: &QueryValue) -> Option<&[usize]> {
        let key = IndexKey::from_query(value)?;
        Some(self.positions.get(&key).map(Vec::as_slice).unwrap_or(&[]))
    }
}

/// Answers index-eligible conditions of the top-level `$and` group.
///
/// Returns the candidate positions and the query with those conditions
/// removed, or `None` when no condition could be answered.
pub(crate) fn prefilter(
    query: &CompiledQuery,
    indexes: &[EqualityIndex],
) -> Option<(Vec<usize>, CompiledQuery)> {
    if indexes.is_empty() {
        return None;
    }
    let group = query.groups().first().filter(|g| g.kind == Compound::And)?;

    let mut candidates: Option<Vec<usize>> = None;
    let mut answered = 0;
    let mut remaining = Vec::with_capacity(group.nodes.len());

    for node in &group.nodes {
        match lookup_node(node, indexes) {
            Some(hits) => {
                answered += 1;
                candidates = Some(match candidates {
                    None => hits.to_vec(),
                    Some(prev) => intersect(&prev, hits),
                });
            }
            None => remaining.push(node.clone()),
        }
    }

    let candidates = candidates?;
    tracing::trace!(
        answered,
        candidates = candidates.len(),
        "equality index narrowed candidates"
    );

    let mut rest = query.clone();
    if let Some(first) = rest.groups_mut().first_mut() {
        first.nodes = remaining;
    }
    Some((candidates, rest))
}

fn lookup_node<'i>(node: &Node, indexes: &'i [EqualityIndex]) -> Option<&'i [usize]> {
    let Node::Condition(condition) = node else {
        return None;
    };
    if condition.op != Op::Equal {
        return None;
    }
    // `$computed` on a plain key reads the record directly, not through the getter.
    if condition.getter.is_some() && !condition.key.contains('.') {
        return None;
    }
    let Operand::Value(value) = &condition.operand else {
        return None;
    };
    indexes
        .iter()
        .find(|index| index.key == condition.key)?
        .lookup(value)
}

fn intersect(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}
