//! Query runner.
//!
//! Applies a query document, a compiled query or a caller predicate to a
//! slice of records in one of three modes: filter, first match, or score.

use std::fmt;

use crate::compile::{parse, CompiledQuery};
use crate::error::{BoxError, CompileError, EvalError, Result};
use crate::eval::{evaluate_scored, matches_all, Getter};
use crate::index::{self, EqualityIndex};
use crate::traits::Record;
use crate::value::Document;

/// What a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Every matching record, in input order.
    #[default]
    Filter,
    /// The first matching record.
    First,
    /// Every record paired with its score, in input order.
    Score,
}

/// Caller predicate accepted in place of a query.
pub type Predicate<'q, R> = &'q dyn Fn(&R) -> std::result::Result<bool, BoxError>;

/// What records are tested against.
pub enum Criteria<'q, R> {
    /// A query document, compiled on the spot.
    Query(&'q Document),
    /// A query compiled earlier.
    Compiled(&'q CompiledQuery),
    /// A caller predicate, used as is. Cannot be scored.
    Predicate(Predicate<'q, R>),
}

impl<R> fmt::Debug for Criteria<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criteria::Query(doc) => f.debug_tuple("Query").field(doc).finish(),
            Criteria::Compiled(query) => f.debug_tuple("Compiled").field(query).finish(),
            Criteria::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl<'q, R> From<&'q Document> for Criteria<'q, R> {
    fn from(doc: &'q Document) -> Self {
        Criteria::Query(doc)
    }
}

impl<'q, R> From<&'q CompiledQuery> for Criteria<'q, R> {
    fn from(query: &'q CompiledQuery) -> Self {
        Criteria::Compiled(query)
    }
}

/// A record and its score.
#[derive(Debug, PartialEq)]
pub struct Scored<'r, R> {
    pub record: &'r R,
    pub score: f64,
}

impl<R> Clone for Scored<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Scored<'_, R> {}

/// Result of a run, shaped by its [`Mode`].
#[derive(Debug, PartialEq)]
pub enum Outcome<'r, R> {
    All(Vec<&'r R>),
    First(Option<&'r R>),
    Scored(Vec<Scored<'r, R>>),
}

impl<'r, R> Outcome<'r, R> {
    /// The matched records; for scored runs, every record.
    pub fn into_records(self) -> Vec<&'r R> {
        match self {
            Outcome::All(records) => records,
            Outcome::First(record) => record.into_iter().collect(),
            Outcome::Scored(scored) => scored.into_iter().map(|s| s.record).collect(),
        }
    }
}

/// Runs `criteria` over `records`.
///
/// # Example
///
/// ```
/// use docquery::{run, Criteria, Document, Getter, Mode, Outcome};
/// use serde_json::json;
///
/// let records = vec![json!({"age": 17}), json!({"age": 30}), json!({"age": 70})];
/// let query = Document::from_json(json!({"age": {"$gte": 18, "$lt": 65}})).unwrap();
///
/// let outcome = run(&records, Criteria::Query(&query), &Getter::Property, Mode::Filter).unwrap();
/// assert_eq!(outcome, Outcome::All(vec![&records[1]]));
/// ```
pub fn run<'r, R: Record>(
    records: &'r [R],
    criteria: Criteria<'_, R>,
    getter: &Getter<R>,
    mode: Mode,
) -> Result<Outcome<'r, R>> {
    run_indexed(records, criteria, getter, mode, &[])
}

/// Runs `criteria` over `records`, answering `$equal` conditions from
/// `indexes` first.
///
/// The indexes must have been built over the same `records` with the same
/// getter. They are only consulted in filter and first-match modes.
pub fn run_indexed<'r, R: Record>(
    records: &'r [R],
    criteria: Criteria<'_, R>,
    getter: &Getter<R>,
    mode: Mode,
    indexes: &[EqualityIndex],
) -> Result<Outcome<'r, R>> {
    let compiled;
    let query = match criteria {
        Criteria::Query(doc) => {
            compiled = parse(doc)?;
            &compiled
        }
        Criteria::Compiled(query) => query,
        Criteria::Predicate(predicate) => return run_predicate(records, predicate, mode),
    };

    if mode == Mode::Score {
        let scored = records
            .iter()
            .map(|record| {
                Ok(Scored {
                    record,
                    score: evaluate_scored(query, record, getter)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(Outcome::Scored(scored));
    }

    match index::prefilter(query, indexes) {
        Some((positions, rest)) => {
            let candidates = positions.into_iter().filter_map(|pos| records.get(pos));
            select(candidates, |record| matches_all(&rest, record, getter), mode)
        }
        None => select(records.iter(), |record| matches_all(query, record, getter), mode),
    }
}

fn run_predicate<'r, R>(
    records: &'r [R],
    predicate: Predicate<'_, R>,
    mode: Mode,
) -> Result<Outcome<'r, R>> {
    if mode == Mode::Score {
        return Err(CompileError::ScoreRequiresQuery.into());
    }
    select(
        records.iter(),
        |record| predicate(record).map_err(EvalError::Predicate),
        mode,
    )
}

fn select<'r, R, I, F>(candidates: I, mut test: F, mode: Mode) -> Result<Outcome<'r, R>>
where
    I: Iterator<Item = &'r R>,
    F: FnMut(&R) -> std::result::Result<bool, EvalError>,
    R: 'r,
{
    if mode == Mode::First {
        for record in candidates {
            if test(record)? {
                return Ok(Outcome::First(Some(record)));
            }
        }
        return Ok(Outcome::First(None));
    }

    let mut matched = Vec::new();
    for record in candidates {
        if test(record)? {
            matched.push(record);
        }
    }
    Ok(Outcome::All(matched))
}

/// Returns every record matching `query`, in input order.
pub fn filter<'r, R: Record>(
    records: &'r [R],
    query: &Document,
    getter: &Getter<R>,
) -> Result<Vec<&'r R>> {
    Ok(run(records, Criteria::Query(query), getter, Mode::Filter)?.into_records())
}

/// Returns the first record matching `query`.
pub fn find_one<'r, R: Record>(
    records: &'r [R],
    query: &Document,
    getter: &Getter<R>,
) -> Result<Option<&'r R>> {
    match run(records, Criteria::Query(query), getter, Mode::First)? {
        Outcome::First(record) => Ok(record),
        other => Ok(other.into_records().into_iter().next()),
    }
}

/// Scores every record against `query`.
///
/// `query` must compile to a single `$and` group.
pub fn score<'r, R: Record>(
    records: &'r [R],
    query: &Document,
    getter: &Getter<R>,
) -> Result<Vec<Scored<'r, R>>> {
    match run(records, Criteria::Query(query), getter, Mode::Score)? {
        Outcome::Scored(scored) => Ok(scored),
        other => Ok(other
            .into_records()
            .into_iter()
            .map(|record| Scored { record, score: 0.0 })
            .collect()),
    }
}

/// A compiled query bound to a getter, reusable as a predicate.
pub struct Tester<R> {
    query: CompiledQuery,
    getter: Getter<R>,
}

impl<R: Record> Tester<R> {
    /// Tests one record.
    pub fn test(&self, record: &R) -> Result<bool> {
        Ok(matches_all(&self.query, record, &self.getter)?)
    }

    /// The compiled query.
    pub fn query(&self) -> &CompiledQuery {
        &self.query
    }
}

impl<R> Clone for Tester<R> {
    fn clone(&self) -> Self {
        Tester {
            query: self.query.clone(),
            getter: self.getter.clone(),
        }
    }
}

impl<R> fmt::Debug for Tester<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tester")
            .field("query", &self.query)
            .field("getter", &self.getter)
            .finish()
    }
}

/// Compiles `query` into a reusable [`Tester`].
pub fn compile_tester<R: Record>(query: &Document, getter: Getter<R>) -> Result<Tester<R>> {
    Ok(Tester {
        query: parse(query)?,
        getter,
    })
}
