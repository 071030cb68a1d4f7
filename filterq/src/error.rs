//! Error types for FilterQ operations.
//!
//! Every error is fatal to the evaluation that raised it: a filter is either
//! applied completely or rejected with one of these reasons.

use std::path::PathBuf;

/// Errors raised while parsing an expression.
///
/// Positions are byte offsets into the normalized input (the trimmed
/// expression, possibly wrapped in one extra pair of parentheses).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Closing ) not found for group opened at position {position}")]
    UnclosedGroup { position: usize },

    #[error("Closing quote (') not found for string starting at position {position}")]
    UnterminatedString { position: usize },

    #[error("AND and OR cannot be combined together at position {position}. Use parentheses to separate them")]
    MixedLogicWithoutGrouping { position: usize },

    #[error("Missing or malformed value for '{field}' at position {position}")]
    MissingValue { field: String, position: usize },

    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },

    #[error("Groups nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
}

/// Errors raised when a literal does not satisfy a field's constraints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("The key {field} only supports the following values for filtering: {allowed}. '{given}' given")]
    ValueNotAllowed {
        field: String,
        allowed: String,
        given: String,
    },

    #[error("Value for {field} should be one of: {expected}")]
    TypeMismatch { field: String, expected: String },
}

/// Errors raised by the registries and the filter applier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Key '{0}' is not supported for filtering")]
    UnknownField(String),

    #[error("Operator '{0}' not supported for filtering")]
    UnknownOperator(String),

    #[error("Operator '{operator}' is not allowed for filtering (with {field})")]
    OperatorNotPermittedForField { operator: String, field: String },

    #[error("Invalid key name: {0}")]
    InvalidFieldName(String),

    #[error("Key type {0} is not supported")]
    UnknownValueType(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid value: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Registry(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
