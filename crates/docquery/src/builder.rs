//! Fluent query builder.
//!
//! [`QueryBuilder`] collects query fragments under `$and`, `$or`, `$not` and
//! `$nor`, then runs the assembled document over the records it was created
//! with.

use crate::compile::{parse, CompiledQuery};
use crate::error::Result;
use crate::eval::Getter;
use crate::index::EqualityIndex;
use crate::op::Compound;
use crate::query::{compile_tester, run_indexed, Criteria, Mode, Outcome, Scored, Tester};
use crate::traits::Record;
use crate::value::{Document, QueryValue};

/// Builds and runs a query over a slice of records.
///
/// # Example
///
/// ```
/// use docquery::QueryBuilder;
/// use serde_json::json;
///
/// let posts = vec![
///     json!({"title": "Home", "likes": 12, "draft": false}),
///     json!({"title": "About", "likes": 3, "draft": false}),
///     json!({"title": "News", "likes": 40, "draft": true}),
/// ];
///
/// let found = QueryBuilder::new(&posts)
///     .and_where("likes", json!({"$gt": 10}))
///     .not(json!({"draft": true}))
///     .all()
///     .unwrap();
/// assert_eq!(found, vec![&posts[0]]);
/// ```
pub struct QueryBuilder<'r, R> {
    records: &'r [R],
    and: Vec<QueryValue>,
    not: Vec<QueryValue>,
    or: Vec<QueryValue>,
    nor: Vec<QueryValue>,
    getter: Getter<R>,
    indexes: Vec<String>,
}

impl<'r, R: Record> QueryBuilder<'r, R> {
    /// Creates an empty builder over `records`.
    ///
    /// An empty query matches every record.
    pub fn new(records: &'r [R]) -> Self {
        QueryBuilder {
            records,
            and: Vec::new(),
            not: Vec::new(),
            or: Vec::new(),
            nor: Vec::new(),
            getter: Getter::Property,
            indexes: Vec::new(),
        }
    }

    // ========================================================================
    // Fragments
    // ========================================================================

    /// Adds a sub-query that must match.
    pub fn and(mut self, fragment: impl Into<QueryValue>) -> Self {
        self.and.push(fragment.into());
        self
    }

    /// Adds a sub-query of which at least one must match.
    pub fn or(mut self, fragment: impl Into<QueryValue>) -> Self {
        self.or.push(fragment.into());
        self
    }

    /// Adds a sub-query that must not match.
    pub fn not(mut self, fragment: impl Into<QueryValue>) -> Self {
        self.not.push(fragment.into());
        self
    }

    /// Adds a sub-query to the none-may-match list.
    pub fn nor(mut self, fragment: impl Into<QueryValue>) -> Self {
        self.nor.push(fragment.into());
        self
    }

    /// Adds `{key: clause}` under `$and`.
    pub fn and_where(self, key: &str, clause: impl Into<QueryValue>) -> Self {
        self.and(Document::new().with(key, clause))
    }

    /// Adds `{key: clause}` under `$or`.
    pub fn or_where(self, key: &str, clause: impl Into<QueryValue>) -> Self {
        self.or(Document::new().with(key, clause))
    }

    /// Adds `{key: clause}` under `$not`.
    pub fn not_where(self, key: &str, clause: impl Into<QueryValue>) -> Self {
        self.not(Document::new().with(key, clause))
    }

    /// Adds `{key: clause}` under `$nor`.
    pub fn nor_where(self, key: &str, clause: impl Into<QueryValue>) -> Self {
        self.nor(Document::new().with(key, clause))
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Sets how attributes are read.
    pub fn getter(mut self, getter: Getter<R>) -> Self {
        self.getter = getter;
        self
    }

    /// Answers `$equal` conditions on `key` from an index.
    ///
    /// Indexes are built over the builder's records when a filter or
    /// first-match run starts.
    pub fn index(mut self, key: &str) -> Self {
        if !self.indexes.iter().any(|k| k == key) {
            self.indexes.push(key.to_string());
        }
        self
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// The assembled query document.
    pub fn document(&self) -> Document {
        let mut doc = Document::new();
        for (kind, fragments) in [
            (Compound::And, &self.and),
            (Compound::Not, &self.not),
            (Compound::Or, &self.or),
            (Compound::Nor, &self.nor),
        ] {
            if !fragments.is_empty() {
                doc.insert(kind.as_str(), QueryValue::Array(fragments.clone()));
            }
        }
        doc
    }

    /// Compiles the assembled document.
    pub fn compile(&self) -> Result<CompiledQuery> {
        parse(&self.document())
    }

    /// Every matching record, in input order.
    pub fn all(&self) -> Result<Vec<&'r R>> {
        Ok(self.execute(Mode::Filter)?.into_records())
    }

    /// The first matching record.
    pub fn first(&self) -> Result<Option<&'r R>> {
        Ok(self.execute(Mode::First)?.into_records().into_iter().next())
    }

    /// Number of matching records.
    pub fn count(&self) -> Result<usize> {
        Ok(self.all()?.len())
    }

    /// Every record with its score. Only `$and` fragments may be present.
    pub fn score(&self) -> Result<Vec<Scored<'r, R>>> {
        match self.execute(Mode::Score)? {
            Outcome::Scored(scored) => Ok(scored),
            other => Ok(other
                .into_records()
                .into_iter()
                .map(|record| Scored { record, score: 0.0 })
                .collect()),
        }
    }

    /// A reusable test for single records.
    pub fn tester(&self) -> Result<Tester<R>> {
        compile_tester(&self.document(), self.getter.clone())
    }

    fn execute(&self, mode: Mode) -> Result<Outcome<'r, R>> {
        let query = self.compile()?;
        let indexes = if mode == Mode::Score {
            Vec::new()
        } else {
            self.indexes
                .iter()
                .map(|key| EqualityIndex::build(key, self.records, &self.getter))
                .collect::<Result<Vec<_>>>()?
        };
        run_indexed(
            self.records,
            Criteria::Compiled(&query),
            &self.getter,
            mode,
            &indexes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompileError, QueryError};
    use serde_json::{json, Value};

    fn posts() -> Vec<Value> {
        vec![
            json!({"title": "Home", "likes": 12, "colors": ["red", "blue"], "author": {"name": "ann"}}),
            json!({"title": "About", "likes": 2, "colors": ["red"], "author": {"name": "bob"}}),
            json!({"title": "Contact", "likes": 20, "colors": ["green"], "author": {"name": "ann"}}),
        ]
    }

    #[test]
    fn empty_builder_matches_everything() {
        let records = posts();
        assert_eq!(QueryBuilder::new(&records).count().unwrap(), 3);
        assert!(QueryBuilder::new(&records).document().is_empty());
    }

    #[test]
    fn fragments_land_under_their_combinator() {
        let records = posts();
        let doc = QueryBuilder::new(&records)
            .and(json!({"likes": {"$gt": 1}}))
            .or_where("title", "Home")
            .nor_where("title", "Contact")
            .not(json!({"likes": 0}))
            .document();
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, vec!["$and", "$not", "$or", "$nor"]);
    }

    #[test]
    fn combines_and_or_not() {
        let records = posts();
        let found = QueryBuilder::new(&records)
            .and_where("likes", json!({"$gt": 1}))
            .or_where("colors", json!({"$contains": "red"}))
            .or_where("title", "Contact")
            .not_where("author.name", "bob")
            .all()
            .unwrap();
        assert_eq!(found, vec![&records[0], &records[2]]);
    }

    #[test]
    fn first_returns_first_match() {
        let records = posts();
        let first = QueryBuilder::new(&records)
            .and_where("author.name", "ann")
            .first()
            .unwrap();
        assert_eq!(first, Some(&records[0]));
    }

    #[test]
    fn indexes_do_not_change_results() {
        let records = posts();
        let build = || {
            QueryBuilder::new(&records)
                .and_where("colors", "red")
                .and_where("likes", json!({"$lt": 15}))
        };
        let plain = build().all().unwrap();
        let indexed = build().index("colors").index("colors").all().unwrap();
        assert_eq!(plain, indexed);
        assert_eq!(indexed, vec![&records[0], &records[1]]);
    }

    #[test]
    fn dotted_index_keys() {
        let records = posts();
        let found = QueryBuilder::new(&records)
            .and_where("author.name", "ann")
            .index("author.name")
            .all()
            .unwrap();
        assert_eq!(found, vec![&records[0], &records[2]]);
    }

    #[test]
    fn custom_getter_applies_to_plain_keys() {
        let records = posts();
        let lowered: Getter<Value> = Getter::func(|record: &Value, key| {
            Ok(record
                .get(key)
                .and_then(Value::as_str)
                .map(|s| json!(s.to_lowercase())))
        });
        let found = QueryBuilder::new(&records)
            .and_where("title", "about")
            .getter(lowered)
            .index("title")
            .all()
            .unwrap();
        assert_eq!(found, vec![&records[1]]);
    }

    #[test]
    fn score_over_and_fragments() {
        let records = posts();
        let scored = QueryBuilder::new(&records)
            .and_where("colors", json!({"$contains": "red"}))
            .and_where("likes", json!({"$gt": 10}))
            .score()
            .unwrap();
        let scores: Vec<f64> = scored.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![1.0, 0.5, 0.5]);
    }

    #[test]
    fn score_rejects_or_fragments() {
        let records = posts();
        let err = QueryBuilder::new(&records)
            .or_where("likes", 2)
            .score()
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Compile(CompileError::ScoreRequiresSingleAnd { .. })
        ));
    }

    #[test]
    fn tester_reuses_query() {
        let records = posts();
        let tester = QueryBuilder::new(&records)
            .and_where("likes", json!({"$betweene": [2, 12]}))
            .tester()
            .unwrap();
        let hits: Vec<bool> = records.iter().map(|r| tester.test(r).unwrap()).collect();
        assert_eq!(hits, vec![true, true, false]);
    }

    #[test]
    fn non_document_fragment_fails_to_compile() {
        let records = posts();
        let err = QueryBuilder::new(&records).and(5).all().unwrap_err();
        assert!(matches!(
            err,
            QueryError::Compile(CompileError::ExpectedDocument(_))
        ));
    }
}
