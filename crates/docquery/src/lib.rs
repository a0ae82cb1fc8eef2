//! Docquery - MongoDB-style queries over in-memory records.
//!
//! A query is a document such as `{"age": {"$gte": 18}, "$or": [...]}`. It is
//! compiled once into a [`CompiledQuery`] and then evaluated against any
//! number of records. Records are anything implementing [`Record`];
//! `serde_json::Value` works out of the box.
//!
//! - Comparison, membership, string, regex, array and type operators
//! - `$and`, `$or`, `$not`, `$nor`, at top level or scoped to one attribute
//! - Dotted paths that broadcast across arrays (`"items.price"`)
//! - Filter, first-match and boosted scoring runs
//! - Caller getters and `$cb` callbacks
//! - Equality indexes for `$equal` pre-filtering
//!
//! # Quick Start
//!
//! ```rust
//! use docquery::{filter, Document, Getter};
//! use serde_json::json;
//!
//! let people = vec![
//!     json!({"name": "John", "age": 17}),
//!     json!({"name": "Joanna", "age": 30}),
//!     json!({"name": "Ann", "age": 70}),
//! ];
//!
//! let query = Document::from_json(json!({
//!     "age": {"$gte": 18, "$lt": 65},
//!     "name": {"$likeI": "jo"}
//! }))
//! .unwrap();
//!
//! let adults = filter(&people, &query, &Getter::Property).unwrap();
//! assert_eq!(adults, vec![&people[1]]);
//! ```
//!
//! # Query Semantics
//!
//! A compiled query holds up to four top-level groups, emitted in the order
//! `$and`, `$not`, `$or`, `$nor`. A record matches when every group passes:
//!
//! ```text
//! $and  every member matches          (empty: matches)
//! $or   at least one member matches   (empty: never matches)
//! $not  no member matches             (empty: matches)
//! $nor  no member matches             (empty: matches)
//! ```
//!
//! Plain keys next to combinators are folded into the `$and` group. Within a
//! group, conditions are evaluated cheapest operator first; the order never
//! changes the result.
//!
//! # Operators
//!
//! | Operand | Operators |
//! |---------|-----------|
//! | any value | `$equal`, `$ne`, `$deepEqual`, `$lt`, `$lte`, `$gt`, `$gte`, `$exists`, `$has`, `$type`, `$contains`, `$date` |
//! | list | `$in`, `$nin`, `$all`, `$any`, `$none` |
//! | pair | `$between`, `$betweene`, `$mod` |
//! | number | `$size` |
//! | string | `$like`, `$likeI`, `$startsWith`, `$endsWith` |
//! | pattern | `$regex`, `$regexp` (with `$options`) |
//! | document | `$elemMatch`, `$computed` |
//! | callback | `$cb` |
//!
//! Any clause may carry `$boost` to weight it when scoring. Boosts must be
//! finite and non-negative.
//!
//! `$type` names come from [`Kind`]: `null`, `undefined`, `boolean`,
//! `number`, `string`, `array` and `object`. This is not JavaScript's
//! `typeof`: arrays and null never match `"object"`.

mod builder;
mod clause;
mod compile;
mod error;
mod eval;
mod index;
mod kind;
mod op;
mod path;
mod query;
mod traits;
mod value;

// Re-export public API
pub use builder::QueryBuilder;
pub use clause::{compare, deep_eq, strict_eq, Condition, Group, Node, Operand};
pub use compile::{parse, parse_json, CompiledQuery};
pub use error::{BoxError, CompileError, EvalError, QueryError, Result};
pub use eval::{evaluate, evaluate_scored, resolve_attribute, Getter};
pub use index::{EqualityIndex, IndexKey};
pub use kind::{classify, Kind};
pub use op::{Compound, Op, OPERATORS};
pub use path::{make_getter, PathGetter};
pub use query::{
    compile_tester, filter, find_one, run, run_indexed, score, Criteria, Mode, Outcome, Predicate,
    Scored, Tester,
};
pub use traits::Record;
pub use value::{Callback, Document, Number, QueryValue, Timestamp};
