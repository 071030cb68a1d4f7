//! FilterQ: filter expressions for query builders
//!
//! Parses compact expressions such as `(status=active&(views>10|featured=true))`
//! into a tree, validates each comparison against registered fields and
//! operators, and emits parameterized predicates into a `SELECT` builder.

pub mod config;
pub mod error;
pub mod expr;
pub mod filter;
pub mod registry;
pub mod sql;
pub mod validate;

pub use config::{Config, FieldConfig};
pub use error::{ConfigError, Error, ParseError, Result, ValidationError};
pub use expr::{parse, parse_with, Comparison, Connector, ExpressionNode, Group, Literal, ParseOptions};
pub use filter::Filter;
pub use registry::{FieldDescriptor, FieldRegistry, Operator, OperatorRegistry};
pub use sql::{Condition, JoinClause, JoinKind, SelectQuery, WhereGroup};
pub use validate::{validate, FieldConstraint, ValueType};
