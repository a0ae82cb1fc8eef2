//! Error types for the docquery crate.

use thiserror::Error;

/// Boxed error returned by caller-supplied callbacks and getters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while compiling a query document.
///
/// Compilation is all-or-nothing: any of these aborts `parse` and no
/// partially compiled query is returned.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Operand does not have the shape the operator expects.
    #[error("query value ({value}) doesn't match query type: ({op})")]
    InvalidOperand { op: &'static str, value: String },

    /// Key starting with `$` that is not a known operator.
    #[error("unknown query operator '{0}'")]
    UnknownOperator(String),

    /// `$and`, `$or` and `$nor` take a list of sub-queries.
    #[error("{0} query must be an array")]
    ExpectedArray(&'static str),

    /// A sub-query position held something other than a document.
    #[error("expected a query document, got {0}")]
    ExpectedDocument(String),

    /// `$options` given without `$regex` / `$regexp`.
    #[error("$options needs a $regex")]
    OptionsWithoutRegex,

    /// Invalid regular expression pattern.
    #[error("invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Regex flag that has no equivalent.
    #[error("unsupported regex flag '{0}'")]
    InvalidRegexFlag(char),

    /// `$boost` must be a finite, non-negative number.
    #[error("$boost must be a non-negative number, got {0}")]
    InvalidBoost(String),

    /// Scoring works on exactly one top-level `$and` group.
    #[error("score operations only work on a single $and query (found {found})")]
    ScoreRequiresSingleAnd { found: String },

    /// Scoring needs a query, not an opaque predicate.
    #[error("score operations need a query document or compiled query")]
    ScoreRequiresQuery,
}

/// Errors raised while evaluating a compiled query against a record.
///
/// These only originate in caller-supplied code; the engine never
/// produces an evaluation failure of its own.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A `$cb` callback failed.
    #[error("callback failed: {0}")]
    Callback(#[source] BoxError),

    /// A custom getter failed while reading `key`.
    #[error("getter failed for '{key}': {source}")]
    Getter {
        key: String,
        #[source]
        source: BoxError,
    },

    /// A record was asked to invoke a method it does not provide.
    #[error("record has no method '{0}'")]
    UnknownMethod(String),

    /// A caller predicate failed.
    #[error("predicate failed: {0}")]
    Predicate(#[source] BoxError),
}

/// Any error produced by docquery.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl From<regex::Error> for QueryError {
    fn from(err: regex::Error) -> Self {
        QueryError::Compile(CompileError::InvalidRegex(err))
    }
}

/// Result type for docquery operations.
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_messages_name_operator() {
        let err = CompileError::InvalidOperand {
            op: "$in",
            value: "5".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "query value (5) doesn't match query type: ($in)"
        );
        assert_eq!(
            CompileError::ExpectedArray("$or").to_string(),
            "$or query must be an array"
        );
    }

    #[test]
    fn query_error_is_transparent() {
        let err: QueryError = CompileError::OptionsWithoutRegex.into();
        assert_eq!(err.to_string(), "$options needs a $regex");

        let err: QueryError = EvalError::UnknownMethod("get".into()).into();
        assert_eq!(err.to_string(), "record has no method 'get'");
    }
}
