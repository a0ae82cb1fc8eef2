//! Property-based tests for docquery using proptest.

use docquery::{filter, find_one, parse_json, Document, Getter, QueryBuilder};
use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// Test helpers
// ============================================================================

fn doc(value: Value) -> Document {
    Document::from_json(value).unwrap()
}

// Strategy to generate flat records with optional fields
fn record_strategy() -> impl Strategy<Value = Value> {
    (
        prop::option::of(-20i64..20),
        prop::option::of("[a-c]{1,3}"),
        any::<bool>(),
        prop::collection::vec("[a-c]", 0..4),
    )
        .prop_map(|(n, s, flag, tags)| {
            let mut map = serde_json::Map::new();
            if let Some(n) = n {
                map.insert("n".into(), json!(n));
            }
            if let Some(s) = s {
                map.insert("s".into(), json!(s));
            }
            map.insert("flag".into(), json!(flag));
            map.insert("tags".into(), json!(tags));
            Value::Object(map)
        })
}

// Strategy to generate single-attribute clauses
fn clause_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-20i64..20).prop_map(|v| json!({"n": {"$gt": v}})),
        (-20i64..20).prop_map(|v| json!({"n": {"$lte": v}})),
        (-20i64..20).prop_map(|v| json!({"n": v})),
        prop::collection::vec(-20i64..20, 1..4).prop_map(|vs| json!({"n": {"$in": vs}})),
        "[a-c]{1,2}".prop_map(|v| json!({"s": {"$likeI": v}})),
        "[a-c]".prop_map(|v| json!({"tags": {"$contains": v}})),
        any::<bool>().prop_map(|v| json!({"flag": v})),
        any::<bool>().prop_map(|v| json!({"s": {"$exists": v}})),
    ]
}

// Later clauses on the same key replace earlier ones.
fn merged(clauses: &[Value]) -> Value {
    let mut map = serde_json::Map::new();
    for clause in clauses {
        if let Value::Object(inner) = clause {
            for (key, value) in inner {
                map.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(map)
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// Filter never returns more records than it was given.
    #[test]
    fn filter_never_grows_collection(
        records in prop::collection::vec(record_strategy(), 0..40),
        clause in clause_strategy(),
    ) {
        let found = filter(&records, &doc(clause), &Getter::Property).unwrap();
        prop_assert!(found.len() <= records.len());
    }

    /// An empty `$and` matches every record.
    #[test]
    fn empty_and_matches_all(records in prop::collection::vec(record_strategy(), 0..40)) {
        let found = filter(&records, &doc(json!({"$and": []})), &Getter::Property).unwrap();
        prop_assert_eq!(found.len(), records.len());
    }

    /// `$in` and `$nin` partition the records that carry the attribute.
    #[test]
    fn in_and_nin_complement(
        record in record_strategy(),
        values in prop::collection::vec(-20i64..20, 1..5),
    ) {
        let is_in = parse_json(json!({"n": {"$in": values.clone()}})).unwrap().matches(&record).unwrap();
        let not_in = parse_json(json!({"n": {"$nin": values}})).unwrap().matches(&record).unwrap();
        if record.get("n").is_some() {
            prop_assert_ne!(is_in, not_in);
        } else {
            prop_assert!(!is_in && !not_in);
        }
    }

    /// `$not` of a clause behaves like `$nor` of the same clause.
    #[test]
    fn not_equals_nor(record in record_strategy(), clause in clause_strategy()) {
        let not = parse_json(json!({"$not": clause.clone()})).unwrap().matches(&record).unwrap();
        let nor = parse_json(json!({"$nor": [clause]})).unwrap().matches(&record).unwrap();
        prop_assert_eq!(not, nor);
    }

    /// The equivalence holds for members with several conditions.
    #[test]
    fn not_equals_nor_for_merged_members(
        record in record_strategy(),
        clauses in prop::collection::vec(clause_strategy(), 1..4),
    ) {
        let member = merged(&clauses);
        let not = parse_json(json!({"$not": [member.clone()]})).unwrap().matches(&record).unwrap();
        let nor = parse_json(json!({"$nor": [member]})).unwrap().matches(&record).unwrap();
        prop_assert_eq!(not, nor);
    }

    /// Evaluation order never changes the outcome of `$and`, `$or` or `$nor`.
    #[test]
    fn member_order_does_not_matter(
        record in record_strategy(),
        clauses in prop::collection::vec(clause_strategy(), 1..5),
    ) {
        let reversed: Vec<Value> = clauses.iter().rev().cloned().collect();
        for op in ["$and", "$or", "$nor"] {
            let forward = parse_json(json!({op: clauses.clone()})).unwrap().matches(&record).unwrap();
            let backward = parse_json(json!({op: reversed.clone()})).unwrap().matches(&record).unwrap();
            prop_assert_eq!(forward, backward);
        }
    }

    /// `$and` of clauses agrees with testing each clause on its own.
    #[test]
    fn and_is_conjunction(
        record in record_strategy(),
        clauses in prop::collection::vec(clause_strategy(), 0..5),
    ) {
        let combined = parse_json(json!({"$and": clauses.clone()})).unwrap().matches(&record).unwrap();
        let each = clauses
            .iter()
            .all(|clause| parse_json(clause.clone()).unwrap().matches(&record).unwrap());
        prop_assert_eq!(combined, each);
    }

    /// `$or` of clauses agrees with testing each clause on its own.
    #[test]
    fn or_is_disjunction(
        record in record_strategy(),
        clauses in prop::collection::vec(clause_strategy(), 0..5),
    ) {
        let combined = parse_json(json!({"$or": clauses.clone()})).unwrap().matches(&record).unwrap();
        let each = clauses
            .iter()
            .any(|clause| parse_json(clause.clone()).unwrap().matches(&record).unwrap());
        prop_assert_eq!(combined, each);
    }

    /// `find_one` returns the first record `filter` returns.
    #[test]
    fn find_one_consistent_with_filter(
        records in prop::collection::vec(record_strategy(), 0..30),
        clause in clause_strategy(),
    ) {
        let query = doc(clause);
        let found = find_one(&records, &query, &Getter::Property).unwrap();
        let filtered = filter(&records, &query, &Getter::Property).unwrap();
        prop_assert_eq!(found, filtered.first().copied());
    }

    /// Scores stay within `[0, 1]`.
    #[test]
    fn scores_are_normalized(
        record in record_strategy(),
        clauses in prop::collection::vec(clause_strategy(), 1..5),
        boost in 1u32..5,
    ) {
        let mut boosted = clauses.clone();
        if let Some(Value::Object(first)) = boosted.first_mut() {
            for value in first.values_mut() {
                if let Value::Object(ops) = value {
                    ops.insert("$boost".into(), json!(boost));
                }
            }
        }
        let score = parse_json(json!({"$and": boosted})).unwrap().score(&record).unwrap();
        prop_assert!((0.0..=1.0).contains(&score));
    }

    /// Equality indexes never change which records match.
    #[test]
    fn index_preserves_results(
        records in prop::collection::vec(record_strategy(), 0..30),
        clauses in prop::collection::vec(clause_strategy(), 1..4),
    ) {
        let query = merged(&clauses);
        let plain = QueryBuilder::new(&records).and(query.clone()).all().unwrap();
        let indexed = QueryBuilder::new(&records)
            .and(query)
            .index("n")
            .index("tags")
            .index("flag")
            .all()
            .unwrap();
        prop_assert_eq!(plain, indexed);
    }
}
