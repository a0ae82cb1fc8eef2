//! Query document compiler.
//!
//! Turns a [`Document`] into a [`CompiledQuery`]: a list of top-level
//! groups whose leaves are validated, preprocessed [`Condition`]s. The
//! overloaded clause grammar is resolved once per clause by
//! [`ClauseKind::classify`]; everything after that is a plain `match`.

use std::borrow::Cow;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::clause::{reverse_lower, Condition, Group, Node, Operand};
use crate::error::{CompileError, Result};
use crate::eval::{self, Getter};
use crate::op::{Compound, Op};
use crate::path::PathGetter;
use crate::traits::Record;
use crate::value::{Document, QueryValue, Timestamp};

type CompileResult<T> = std::result::Result<T, CompileError>;

/// A compiled query.
///
/// Every top-level group must pass for a record to match; an empty query
/// matches everything. Compiled queries are immutable and can be shared
/// across threads and reused for any number of records.
#[derive(Debug, Clone, Default)]
pub struct CompiledQuery {
    groups: Vec<Group>,
}

impl CompiledQuery {
    /// The top-level groups, in `$and`, `$not`, `$or`, `$nor` order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Returns `true` if this query has no groups (matches everything).
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub(crate) fn groups_mut(&mut self) -> &mut Vec<Group> {
        &mut self.groups
    }

    /// Tests a record, reading attributes with [`Record::attribute`].
    pub fn matches<R: Record>(&self, record: &R) -> Result<bool> {
        eval::evaluate(self, record, &Getter::Property)
    }

    /// Tests a record using a caller-supplied getter.
    pub fn matches_with<R: Record>(&self, record: &R, getter: &Getter<R>) -> Result<bool> {
        eval::evaluate(self, record, getter)
    }

    /// Scores a record against this query. See [`eval::evaluate_scored`].
    pub fn score<R: Record>(&self, record: &R) -> Result<f64> {
        eval::evaluate_scored(self, record, &Getter::Property)
    }
}

/// Compiles a query document.
///
/// # Example
///
/// ```
/// use docquery::{parse, Document};
/// use serde_json::json;
///
/// let query = parse(&Document::from_json(json!({"age": {"$gte": 18, "$lt": 65}})).unwrap()).unwrap();
/// assert!(query.matches(&json!({"age": 30})).unwrap());
/// assert!(!query.matches(&json!({"age": 70})).unwrap());
/// ```
pub fn parse(document: &Document) -> Result<CompiledQuery> {
    let compiled = parse_query(document)?;
    tracing::debug!(
        keys = document.len(),
        groups = compiled.groups.len(),
        "compiled query document"
    );
    Ok(compiled)
}

/// Compiles a JSON query document.
pub fn parse_json(document: Value) -> Result<CompiledQuery> {
    parse(&Document::from_json(document)?)
}

fn parse_query(document: &Document) -> CompileResult<CompiledQuery> {
    if document.is_empty() {
        return Ok(CompiledQuery::default());
    }

    let mut compound: Vec<Compound> = Compound::ALL
        .into_iter()
        .filter(|kind| document.contains_key(kind.as_str()))
        .collect();

    for kind in &compound {
        let is_array = matches!(document.get(kind.as_str()), Some(QueryValue::Array(_)));
        if kind.expects_array() && !is_array {
            return Err(CompileError::ExpectedArray(kind.as_str()));
        }
    }

    if compound.is_empty() {
        let nodes = parse_conditions(document)?;
        return Ok(CompiledQuery {
            groups: vec![Group::new(Compound::And, nodes)],
        });
    }

    let normalized = if compound.len() == document.len() {
        Cow::Borrowed(document)
    } else {
        if !compound.contains(&Compound::And) {
            compound.insert(0, Compound::And);
        }
        Cow::Owned(hoist_attributes(document))
    };

    let mut groups = Vec::with_capacity(compound.len());
    for kind in compound {
        let raw = normalized
            .get(kind.as_str())
            .ok_or(CompileError::ExpectedArray(kind.as_str()))?;
        groups.push(Group::new(kind, parse_sub_query(raw, kind)?));
    }
    Ok(CompiledQuery { groups })
}

/// Moves plain attribute keys into one extra `$and` member.
///
/// Works on a copy; the caller's document is left as it was.
fn hoist_attributes(document: &Document) -> Document {
    let mut attributes = Document::new();
    let mut normalized = Document::new();
    for (key, value) in document.iter() {
        if Compound::from_name(key).is_some() {
            normalized.insert(key, value.clone());
        } else {
            attributes.insert(key, value.clone());
        }
    }
    let mut members = match normalized.remove(Compound::And.as_str()) {
        Some(QueryValue::Array(members)) => members,
        _ => Vec::new(),
    };
    members.push(QueryValue::Object(attributes));
    normalized.insert(Compound::And.as_str(), QueryValue::Array(members));
    normalized
}

/// Parses the members of a compound operator.
///
/// A list holds one sub-query per element; a document holds one sub-query
/// per key. Under `$or` and `$nor`, a member that yields several conditions
/// is kept together as an `$and` group.
fn parse_sub_query(raw: &QueryValue, kind: Compound) -> CompileResult<Vec<Node>> {
    let mut nodes = Vec::new();
    match raw {
        QueryValue::Array(members) => {
            for member in members {
                let document = member
                    .as_document()
                    .ok_or_else(|| CompileError::ExpectedDocument(member.to_string()))?;
                push_member(&mut nodes, parse_conditions(document)?, kind);
            }
        }
        QueryValue::Object(document) => {
            for (key, value) in document.iter() {
                nodes.push(parse_condition(key, value)?);
            }
        }
        other => return Err(CompileError::ExpectedDocument(other.to_string())),
    }
    sort_nodes(&mut nodes);
    Ok(nodes)
}

fn push_member(nodes: &mut Vec<Node>, parsed: Vec<Node>, kind: Compound) {
    if kind == Compound::Or && parsed.len() >= 2 {
        nodes.push(Node::Group(Group::new(Compound::And, parsed)));
    } else {
        nodes.extend(parsed);
    }
}

fn parse_conditions(document: &Document) -> CompileResult<Vec<Node>> {
    let mut nodes = document
        .iter()
        .map(|(key, value)| parse_condition(key, value))
        .collect::<CompileResult<Vec<_>>>()?;
    sort_nodes(&mut nodes);
    Ok(nodes)
}

/// Cheap rejections first. The sort is stable, so equal-precedence nodes
/// keep document order.
fn sort_nodes(nodes: &mut [Node]) {
    nodes.sort_by_key(Node::precedence);
}

/// How a single `{key: clause}` pair is to be read.
#[derive(Debug)]
enum ClauseKind<'q> {
    /// Regex literal: `{name: /^jo/}`.
    Pattern(&'q Regex),
    /// Date literal.
    Date(Timestamp),
    /// Combinator used as a key: `{"$or": [...]}` inside another group.
    Nested(Compound, &'q QueryValue),
    /// Combinator applied to one attribute: `{name: {"$not": ...}}`.
    Scoped(Compound, &'q QueryValue),
    /// One operator, optionally with `$options`.
    Operator {
        op: Op,
        value: &'q QueryValue,
        options: Option<&'q QueryValue>,
    },
    /// Several operators on one attribute, combined with `$and`.
    Shorthand(&'q Document),
    /// Arrays, operator-free objects and NaN: compared structurally.
    Literal(&'q QueryValue),
    /// Any other value: compared with `$equal`.
    Scalar(&'q QueryValue),
}

impl<'q> ClauseKind<'q> {
    fn classify(key: &str, param: &'q QueryValue) -> CompileResult<Self> {
        if let Some(kind) = Compound::from_name(key) {
            return match param {
                QueryValue::Array(_) | QueryValue::Object(_) => Ok(ClauseKind::Nested(kind, param)),
                _ if kind.expects_array() => Err(CompileError::ExpectedArray(kind.as_str())),
                other => Err(CompileError::ExpectedDocument(other.to_string())),
            };
        }

        match param {
            QueryValue::Regex(re) => Ok(ClauseKind::Pattern(re)),
            QueryValue::Date(ts) => Ok(ClauseKind::Date(*ts)),
            QueryValue::Array(_) => Ok(ClauseKind::Literal(param)),
            QueryValue::Object(document) => Self::classify_object(document, param),
            QueryValue::Function(_) => Err(CompileError::InvalidOperand {
                op: Op::Equal.as_str(),
                value: param.to_string(),
            }),
            _ if param.is_nan() => Ok(ClauseKind::Literal(param)),
            _ => Ok(ClauseKind::Scalar(param)),
        }
    }

    fn classify_object(document: &'q Document, param: &'q QueryValue) -> CompileResult<Self> {
        if let Some(plain) = document.keys().find(|key| !key.starts_with('$')) {
            // Mixing operators with plain keys is ambiguous.
            return if document.keys().any(|key| key.starts_with('$')) {
                Err(CompileError::UnknownOperator(plain.to_string()))
            } else {
                Ok(ClauseKind::Literal(param))
            };
        }
        if document.is_empty() {
            return Ok(ClauseKind::Literal(param));
        }

        let options = document.get("$options");
        let operators: Vec<(&str, &QueryValue)> = document
            .iter()
            .filter(|(name, _)| *name != "$options")
            .collect();

        match operators.as_slice() {
            [] => Err(CompileError::OptionsWithoutRegex),
            [(name, value)] => {
                let (name, value) = (*name, *value);
                if let Some(kind) = Compound::from_name(name) {
                    if options.is_some() {
                        return Err(CompileError::OptionsWithoutRegex);
                    }
                    return Ok(ClauseKind::Scoped(kind, value));
                }
                let op = Op::from_name(name)
                    .ok_or_else(|| CompileError::UnknownOperator(name.to_string()))?;
                if options.is_some() && !matches!(op, Op::Regex | Op::RegExp) {
                    return Err(CompileError::OptionsWithoutRegex);
                }
                Ok(ClauseKind::Operator { op, value, options })
            }
            _ => Ok(ClauseKind::Shorthand(document)),
        }
    }
}

fn parse_condition(key: &str, param: &QueryValue) -> CompileResult<Node> {
    let (param, boost) = split_boost(param)?;

    let mut node = match ClauseKind::classify(key, &param)? {
        ClauseKind::Pattern(re) => Node::Condition(Condition::new(
            key,
            Op::RegExp,
            Operand::Pattern(re.clone()),
        )),
        ClauseKind::Date(ts) => Node::Condition(Condition::new(
            key,
            Op::Date,
            Operand::Value(QueryValue::Date(ts)),
        )),
        ClauseKind::Nested(kind, raw) => Node::Group(Group::new(kind, parse_sub_query(raw, kind)?)),
        ClauseKind::Scoped(kind, raw) => Node::Group(Group::new(kind, parse_scoped(key, raw)?)),
        ClauseKind::Operator { op, value, options } => parse_operator(key, op, value, options)?,
        ClauseKind::Shorthand(document) => {
            Node::Group(Group::new(Compound::And, expand_shorthand(key, document)?))
        }
        ClauseKind::Literal(value) => Node::Condition(Condition::new(
            key,
            Op::DeepEqual,
            Operand::Value(value.clone()),
        )),
        ClauseKind::Scalar(value) => Node::Condition(Condition::new(
            key,
            Op::Equal,
            Operand::Value(value.clone()),
        )),
    };

    if let Some(boost) = boost {
        node.set_boost(boost);
    }
    Ok(node)
}

/// Takes `$boost` out of an operator object.
fn split_boost(param: &QueryValue) -> CompileResult<(Cow<'_, QueryValue>, Option<f64>)> {
    let QueryValue::Object(document) = param else {
        return Ok((Cow::Borrowed(param), None));
    };
    if !document.contains_key("$boost") {
        return Ok((Cow::Borrowed(param), None));
    }
    let mut document = document.clone();
    let boost = match document.remove("$boost") {
        Some(QueryValue::Number(n)) if n.to_f64().is_finite() && n.to_f64() >= 0.0 => n.to_f64(),
        other => {
            return Err(CompileError::InvalidBoost(
                other.map(|v| v.to_string()).unwrap_or_default(),
            ))
        }
    };
    Ok((Cow::Owned(QueryValue::Object(document)), Some(boost)))
}

/// Parses the operand of an attribute-scoped combinator.
///
/// A list holds one clause per element; anything else is a single clause.
fn parse_scoped(key: &str, raw: &QueryValue) -> CompileResult<Vec<Node>> {
    let mut nodes = match raw {
        QueryValue::Array(clauses) => clauses
            .iter()
            .map(|clause| parse_condition(key, clause))
            .collect::<CompileResult<Vec<_>>>()?,
        clause => vec![parse_condition(key, clause)?],
    };
    sort_nodes(&mut nodes);
    Ok(nodes)
}

/// `{age: {$gte: 18, $lt: 65}}` becomes one condition per operator.
///
/// `$options` stays attached to its `$regex` / `$regexp` sibling.
fn expand_shorthand(key: &str, document: &Document) -> CompileResult<Vec<Node>> {
    let options = document.get("$options");
    if options.is_some() && !document.keys().any(|k| k == "$regex" || k == "$regexp") {
        return Err(CompileError::OptionsWithoutRegex);
    }

    let mut nodes = Vec::with_capacity(document.len());
    for (name, value) in document.iter() {
        if name == "$options" {
            continue;
        }
        let mut single = Document::new().with(name, value.clone());
        if let Some(options) = options {
            if matches!(Op::from_name(name), Some(Op::Regex | Op::RegExp)) {
                single.insert("$options", options.clone());
            }
        }
        nodes.push(parse_condition(key, &QueryValue::Object(single))?);
    }
    sort_nodes(&mut nodes);
    Ok(nodes)
}

fn invalid(op: Op, value: &QueryValue) -> CompileError {
    CompileError::InvalidOperand {
        op: op.as_str(),
        value: value.to_string(),
    }
}

fn parse_operator(
    key: &str,
    op: Op,
    value: &QueryValue,
    options: Option<&QueryValue>,
) -> CompileResult<Node> {
    if !op.accepts(value) {
        return Err(invalid(op, value));
    }

    let text = || value.as_str().ok_or_else(|| invalid(op, value));

    let operand = match op {
        Op::Computed => {
            let mut node = parse_condition(key, value)?;
            if let Node::Condition(condition) = &mut node {
                condition.getter = Some(PathGetter::new(key));
            }
            return Ok(node);
        }
        Op::ElemMatch => {
            let document = value.as_document().ok_or_else(|| invalid(op, value))?;
            Operand::Query(Box::new(parse_query(document)?))
        }
        Op::EndsWith => Operand::Text(reverse_lower(text()?)),
        Op::StartsWith | Op::LikeI => Operand::Text(text()?.to_lowercase()),
        Op::Like => Operand::Text(text()?.to_string()),
        Op::Regex | Op::RegExp => Operand::Pattern(build_regex(value, options)?),
        Op::In | Op::Nin | Op::All | Op::Any | Op::None => {
            let items = value.as_array().ok_or_else(|| invalid(op, value))?;
            Operand::List(items.to_vec())
        }
        Op::Between | Op::BetweenE | Op::Mod => match value.as_array() {
            Some([first, second]) => Operand::Pair(first.clone(), second.clone()),
            _ => return Err(invalid(op, value)),
        },
        Op::Size => Operand::Size(value.as_number().ok_or_else(|| invalid(op, value))?),
        Op::Cb => match value {
            QueryValue::Function(callback) => Operand::Callback(callback.clone()),
            _ => return Err(invalid(op, value)),
        },
        _ => Operand::Value(value.clone()),
    };

    // Structured and NaN operands need structural equality.
    let op = match (op, value) {
        (Op::Equal, QueryValue::Array(_) | QueryValue::Object(_)) => Op::DeepEqual,
        (Op::Equal, value) if value.is_nan() => Op::DeepEqual,
        _ => op,
    };

    Ok(Node::Condition(Condition::new(key, op, operand)))
}

fn build_regex(value: &QueryValue, options: Option<&QueryValue>) -> CompileResult<Regex> {
    let pattern = match value {
        QueryValue::Regex(re) => return Ok(re.clone()),
        QueryValue::String(pattern) => pattern,
        other => return Err(invalid(Op::Regex, other)),
    };

    let mut builder = RegexBuilder::new(pattern);
    if let Some(options) = options {
        let flags = options.as_str().ok_or_else(|| CompileError::InvalidOperand {
            op: "$options",
            value: options.to_string(),
        })?;
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'x' => {
                    builder.ignore_whitespace(true);
                }
                // Matching is already unicode-aware and stateless.
                'u' | 'g' => {}
                other => return Err(CompileError::InvalidRegexFlag(other)),
            }
        }
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(value: Value) -> CompiledQuery {
        parse_json(value).unwrap()
    }

    fn compile_err(value: Value) -> CompileError {
        match parse_json(value) {
            Err(crate::QueryError::Compile(err)) => err,
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    fn ops(nodes: &[Node]) -> Vec<String> {
        nodes
            .iter()
            .map(|node| match node {
                Node::Condition(cond) => cond.op.as_str().to_string(),
                Node::Group(group) => group.kind.as_str().to_string(),
            })
            .collect()
    }

    #[test]
    fn empty_document_compiles_to_nothing() {
        assert!(compile(json!({})).is_empty());
    }

    #[test]
    fn plain_keys_become_implicit_and() {
        let query = compile(json!({"a": 1, "b": "x"}));
        assert_eq!(query.groups().len(), 1);
        assert_eq!(query.groups()[0].kind, Compound::And);
        assert_eq!(ops(&query.groups()[0].nodes), vec!["$equal", "$equal"]);
    }

    #[test]
    fn compound_only_document_keeps_groups_in_fixed_order() {
        let query = compile(json!({"$or": [{"a": 1}], "$and": [{"b": 2}], "$nor": [{"c": 3}]}));
        let kinds: Vec<Compound> = query.groups().iter().map(|g| g.kind).collect();
        assert_eq!(kinds, vec![Compound::And, Compound::Or, Compound::Nor]);
    }

    #[test]
    fn mixed_document_hoists_attributes_into_and() {
        let doc = Document::from_json(json!({"$or": [{"a": 1}, {"a": 2}], "b": 3})).unwrap();
        let before = doc.clone();
        let query = parse(&doc).unwrap();

        assert_eq!(doc, before);
        let kinds: Vec<Compound> = query.groups().iter().map(|g| g.kind).collect();
        assert_eq!(kinds, vec![Compound::And, Compound::Or]);
        assert_eq!(ops(&query.groups()[0].nodes), vec!["$equal"]);
    }

    #[test]
    fn mixed_document_appends_to_existing_and() {
        let query = compile(json!({"$and": [{"a": 1}], "b": 2}));
        assert_eq!(query.groups().len(), 1);
        assert_eq!(query.groups()[0].nodes.len(), 2);
    }

    #[test]
    fn compound_values_must_be_arrays() {
        assert!(matches!(
            compile_err(json!({"$or": {"a": 1}})),
            CompileError::ExpectedArray("$or")
        ));
        assert!(matches!(
            compile_err(json!({"$and": 5})),
            CompileError::ExpectedArray("$and")
        ));
        assert!(matches!(
            compile_err(json!({"$nor": "x"})),
            CompileError::ExpectedArray("$nor")
        ));
    }

    #[test]
    fn not_accepts_document() {
        let query = compile(json!({"$not": {"a": 1, "b": 2}}));
        assert_eq!(query.groups()[0].kind, Compound::Not);
        assert_eq!(query.groups()[0].nodes.len(), 2);
    }

    #[test]
    fn or_members_with_several_conditions_are_grouped() {
        let query = compile(json!({"$or": [{"a": 1, "b": 2}, {"c": 3}]}));
        assert_eq!(ops(&query.groups()[0].nodes), vec!["$equal", "$and"]);
    }

    #[test]
    fn nor_members_are_flattened_like_not() {
        let nor = compile(json!({"$nor": [{"a": 1, "b": 2}]}));
        let not = compile(json!({"$not": [{"a": 1, "b": 2}]}));
        assert_eq!(ops(&nor.groups()[0].nodes), vec!["$equal", "$equal"]);
        assert_eq!(ops(&nor.groups()[0].nodes), ops(&not.groups()[0].nodes));

        let record = json!({"a": 1, "b": 5});
        assert!(!nor.matches(&record).unwrap());
        assert!(!not.matches(&record).unwrap());
    }

    #[test]
    fn multi_condition_shorthand_expands_to_and() {
        let query = compile(json!({"age": {"$lt": 65, "$gte": 18}}));
        let Node::Group(group) = &query.groups()[0].nodes[0] else {
            panic!("expected group");
        };
        assert_eq!(group.kind, Compound::And);
        assert_eq!(ops(&group.nodes), vec!["$lt", "$gte"]);
    }

    #[test]
    fn conditions_sorted_by_precedence() {
        let query = compile(json!({
            "tags": {"$elemMatch": {"a": 1}},
            "name": {"$regex": "x"},
            "age": {"$gt": 3},
            "kind": "a"
        }));
        assert_eq!(
            ops(&query.groups()[0].nodes),
            vec!["$gt", "$equal", "$regex", "$elemMatch"]
        );
    }

    #[test]
    fn literal_arrays_and_objects_use_deep_equal() {
        let query = compile(json!({"a": [1, 2], "b": {"x": 1}, "c": {"$equal": [1]}}));
        assert_eq!(
            ops(&query.groups()[0].nodes),
            vec!["$deepEqual", "$deepEqual", "$deepEqual"]
        );
    }

    #[test]
    fn nan_literal_uses_deep_equal() {
        let doc = Document::new().with("a", f64::NAN);
        let query = parse(&doc).unwrap();
        assert_eq!(ops(&query.groups()[0].nodes), vec!["$deepEqual"]);
    }

    #[test]
    fn preprocesses_string_operands() {
        let query = compile(json!({"a": {"$endsWith": "XyZ"}, "b": {"$startsWith": "AB"}, "c": {"$likeI": "Q"}}));
        let texts: Vec<String> = query.groups()[0]
            .nodes
            .iter()
            .filter_map(|node| match node {
                Node::Condition(Condition {
                    operand: Operand::Text(t),
                    ..
                }) => Some(t.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["ab", "zyx", "q"]);
    }

    #[test]
    fn regex_with_options() {
        let query = compile(json!({"name": {"$regex": "^jo", "$options": "i"}}));
        let Node::Condition(cond) = &query.groups()[0].nodes[0] else {
            panic!("expected condition");
        };
        assert!(cond.matches(Some(&json!("JOHN"))));
    }

    #[test]
    fn regex_options_in_shorthand_stay_with_regex() {
        let query = compile(json!({"name": {"$regex": "^jo", "$options": "i", "$ne": "John"}}));
        assert!(query.matches(&json!({"name": "JOE"})).unwrap());
        assert!(!query.matches(&json!({"name": "John"})).unwrap());
    }

    #[test]
    fn options_without_regex_fails() {
        assert!(matches!(
            compile_err(json!({"a": {"$like": "x", "$options": "i"}})),
            CompileError::OptionsWithoutRegex
        ));
        assert!(matches!(
            compile_err(json!({"a": {"$options": "i"}})),
            CompileError::OptionsWithoutRegex
        ));
        assert!(matches!(
            compile_err(json!({"a": {"$gt": 1, "$lt": 3, "$options": "i"}})),
            CompileError::OptionsWithoutRegex
        ));
    }

    #[test]
    fn bad_regex_flag_and_pattern() {
        assert!(matches!(
            compile_err(json!({"a": {"$regex": "x", "$options": "q"}})),
            CompileError::InvalidRegexFlag('q')
        ));
        assert!(matches!(
            compile_err(json!({"a": {"$regex": "("}})),
            CompileError::InvalidRegex(_)
        ));
    }

    #[test]
    fn shape_validation() {
        for (doc, op) in [
            (json!({"a": {"$in": 5}}), "$in"),
            (json!({"a": {"$nin": "x"}}), "$nin"),
            (json!({"a": {"$all": {}}}), "$all"),
            (json!({"a": {"$size": "3"}}), "$size"),
            (json!({"a": {"$like": 3}}), "$like"),
            (json!({"a": {"$between": [1]}}), "$between"),
            (json!({"a": {"$mod": [1, 2, 3]}}), "$mod"),
            (json!({"a": {"$cb": "fn"}}), "$cb"),
            (json!({"a": {"$regex": 1}}), "$regex"),
        ] {
            match compile_err(doc) {
                CompileError::InvalidOperand { op: got, .. } => assert_eq!(got, op),
                other => panic!("expected invalid operand for {op}, got {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_operator_fails() {
        assert!(matches!(
            compile_err(json!({"a": {"$bogus": 1}})),
            CompileError::UnknownOperator(name) if name == "$bogus"
        ));
        assert!(matches!(
            compile_err(json!({"a": {"$gt": 1, "plain": 2}})),
            CompileError::UnknownOperator(name) if name == "plain"
        ));
    }

    #[test]
    fn boost_is_extracted() {
        let query = compile(json!({"a": {"$gt": 1, "$boost": 3}}));
        let node = &query.groups()[0].nodes[0];
        assert!(matches!(node, Node::Condition(c) if c.op == Op::Gt));
        assert_eq!(node.boost(), 3.0);

        assert!(matches!(
            compile_err(json!({"a": {"$gt": 1, "$boost": "big"}})),
            CompileError::InvalidBoost(_)
        ));
    }

    #[test]
    fn negative_boost_fails() {
        assert!(matches!(
            compile_err(json!({"$and": [{"a": {"$equal": 1, "$boost": -1}}]})),
            CompileError::InvalidBoost(value) if value == "-1"
        ));
        let query = compile(json!({"a": {"$equal": 1, "$boost": 0}}));
        assert_eq!(query.groups()[0].nodes[0].boost(), 0.0);
    }

    #[test]
    fn default_boost_is_one() {
        let query = compile(json!({"a": 1}));
        assert_eq!(query.groups()[0].nodes[0].boost(), 1.0);
    }

    #[test]
    fn scoped_combinators() {
        let query = compile(json!({"name": {"$not": {"$like": "x"}}}));
        let Node::Group(group) = &query.groups()[0].nodes[0] else {
            panic!("expected group");
        };
        assert_eq!(group.kind, Compound::Not);
        assert_eq!(ops(&group.nodes), vec!["$like"]);

        let query = compile(json!({"n": {"$or": [{"$lt": 0}, {"$gt": 10}]}}));
        let Node::Group(group) = &query.groups()[0].nodes[0] else {
            panic!("expected group");
        };
        assert_eq!(group.kind, Compound::Or);
        assert_eq!(ops(&group.nodes), vec!["$lt", "$gt"]);
    }

    #[test]
    fn nested_compound_inside_and() {
        let query = compile(json!({"$and": [{"$or": [{"a": 1}, {"b": 1}]}, {"c": 1}]}));
        assert_eq!(ops(&query.groups()[0].nodes), vec!["$equal", "$or"]);
    }

    #[test]
    fn elem_match_compiles_sub_query() {
        let query = compile(json!({"items": {"$elemMatch": {"qty": {"$gt": 2}}}}));
        let Node::Condition(cond) = &query.groups()[0].nodes[0] else {
            panic!("expected condition");
        };
        assert!(matches!(&cond.operand, Operand::Query(q) if q.groups().len() == 1));
    }

    #[test]
    fn computed_forces_path_getter() {
        let query = compile(json!({"total": {"$computed": {"$gt": 5}}}));
        let Node::Condition(cond) = &query.groups()[0].nodes[0] else {
            panic!("expected condition");
        };
        assert_eq!(cond.op, Op::Gt);
        assert_eq!(cond.getter.as_ref().map(PathGetter::path), Some("total"));
    }

    #[test]
    fn regex_and_date_literals() {
        let doc = Document::new()
            .with("name", QueryValue::regex("^a").unwrap())
            .with("at", Timestamp(5));
        let query = parse(&doc).unwrap();
        assert_eq!(ops(&query.groups()[0].nodes), vec!["$regexp", "$date"]);
    }

    #[test]
    fn function_literal_is_rejected() {
        let doc = Document::new().with("a", QueryValue::callback(|_, _| Ok(true)));
        assert!(parse(&doc).is_err());
    }

    #[test]
    fn compiling_twice_is_equivalent() {
        let doc = Document::from_json(json!({"$or": [{"a": 1}], "b": {"$gt": 2}})).unwrap();
        let first = parse(&doc).unwrap();
        let second = parse(&doc).unwrap();
        assert_eq!(format!("{first:?}"), format!("{second:?}"));
    }
}
