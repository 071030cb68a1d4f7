use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::expr::{Connector, Literal};
use crate::sql::WhereGroup;

/// Emits a predicate for a custom operator.
///
/// Receives the group being built, the connector the predicate must be
/// attached with, and the validated value.
pub type OperatorHandler = Arc<dyn Fn(&mut WhereGroup, Connector, &Literal) + Send + Sync>;

/// What an operator symbol resolves to.
#[derive(Clone)]
pub enum Operator {
    /// Emitted as `<column> <sql> ?`
    Fixed(String),
    /// Emitted by a caller-supplied handler
    Custom(OperatorHandler),
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Fixed(sql) => f.debug_tuple("Fixed").field(sql).finish(),
            Operator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Symbol to operator mapping shared by every field.
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    operators: BTreeMap<String, Operator>,
}

const DEFAULT_OPERATORS: [&str; 6] = ["=", "!=", "<", ">", "<=", ">="];

impl Default for OperatorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for symbol in DEFAULT_OPERATORS {
            registry.add(symbol, symbol);
        }
        registry
    }
}

impl OperatorRegistry {
    /// A registry with no operators at all.
    pub fn empty() -> Self {
        Self {
            operators: BTreeMap::new(),
        }
    }

    /// Map `symbol` to a SQL operator. Replaces any existing entry.
    pub fn add(&mut self, symbol: impl Into<String>, sql: impl Into<String>) -> &mut Self {
        self.operators.insert(symbol.into(), Operator::Fixed(sql.into()));
        self
    }

    pub fn add_custom<F>(&mut self, symbol: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut WhereGroup, Connector, &Literal) + Send + Sync + 'static,
    {
        self.operators
            .insert(symbol.into(), Operator::Custom(Arc::new(handler)));
        self
    }

    pub fn remove(&mut self, symbol: &str) -> Option<Operator> {
        self.operators.remove(symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<&Operator> {
        self.operators.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.operators.contains_key(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Operator)> {
        self.operators.iter().map(|(k, v)| (k.as_str(), v))
    }
}
