//! Expression tree produced by the parser.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeTuple};
use serde::{Serialize, Serializer};

/// A node of a parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    /// A parenthesized scope: `(a=1&b=2)`
    Group(Group),
    /// A leaf comparison: `field<op>value`
    Comparison(Comparison),
}

/// Children of one parenthesized scope, combined by a single connector.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub connector: Connector,
    pub children: Vec<ExpressionNode>,
}

/// A `field<op>value` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Dotted identifier, always matching `[A-Za-z0-9_.]+`
    pub field: String,
    /// Operator symbol as written (`=`, `!=`, `~`, ...)
    pub operator: String,
    pub value: Literal,
}

/// Logical connector of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    /// `&`
    And,
    /// `|`
    Or,
}

/// A scalar value parsed from an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
    /// Only produced by the validator when coercing a `date` value.
    DateTime(DateTime<Utc>),
}

impl Connector {
    /// Lowercase name used as the group key in serialized trees.
    pub fn as_str(&self) -> &'static str {
        match self {
            Connector::And => "and",
            Connector::Or => "or",
        }
    }

    /// The glyph that selects this connector in an expression.
    pub fn glyph(&self) -> char {
        match self {
            Connector::And => '&',
            Connector::Or => '|',
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Literal {
    /// Name of the literal's kind, as used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::String(_) => "string",
            Literal::Integer(_) => "int",
            Literal::Float(_) => "float",
            Literal::Boolean(_) => "bool",
            Literal::Null => "null",
            Literal::DateTime(_) => "date",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// Value equality used by allow-lists.
    ///
    /// Integers and floats compare numerically; every other kind only equals
    /// a literal of the same kind.
    pub fn same_value(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Integer(a), Literal::Float(b)) | (Literal::Float(b), Literal::Integer(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }

    /// Write the literal back in expression syntax (strings quoted and escaped).
    fn write_expression(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => {
                f.write_str("'")?;
                for c in s.chars() {
                    if c == '\'' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("'")
            }
            Literal::DateTime(dt) => {
                write!(f, "'{}'", dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => f.write_str(s),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(v) => {
                // Keep a fractional part so the value re-parses as a float
                let text = v.to_string();
                if text.contains('.') {
                    f.write_str(&text)
                } else {
                    write!(f, "{}.0", text)
                }
            }
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => f.write_str("null"),
            Literal::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Integer(value.into())
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Literal::String(s) => serializer.serialize_str(s),
            Literal::Integer(i) => serializer.serialize_i64(*i),
            Literal::Float(v) => serializer.serialize_f64(*v),
            Literal::Boolean(b) => serializer.serialize_bool(*b),
            Literal::Null => serializer.serialize_none(),
            Literal::DateTime(dt) => dt.serialize(serializer),
        }
    }
}

impl Group {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl ExpressionNode {
    /// All leaf comparisons, depth-first in source order.
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        self.collect_comparisons(&mut out);
        out
    }

    fn collect_comparisons<'a>(&'a self, out: &mut Vec<&'a Comparison>) {
        match self {
            ExpressionNode::Comparison(c) => out.push(c),
            ExpressionNode::Group(g) => {
                for child in &g.children {
                    child.collect_comparisons(out);
                }
            }
        }
    }

    /// Number of nested groups on the deepest path (a lone comparison is 0).
    pub fn depth(&self) -> usize {
        match self {
            ExpressionNode::Comparison(_) => 0,
            ExpressionNode::Group(g) => {
                1 + g.children.iter().map(ExpressionNode::depth).max().unwrap_or(0)
            }
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            ExpressionNode::Group(g) => Some(g),
            ExpressionNode::Comparison(_) => None,
        }
    }
}

/// Renders the node back into expression syntax, with every group
/// parenthesized. Parsing the output yields an equal tree.
impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionNode::Comparison(c) => {
                write!(f, "{}{}", c.field, c.operator)?;
                c.value.write_expression(f)
            }
            ExpressionNode::Group(g) => {
                f.write_str("(")?;
                for (i, child) in g.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", g.connector.glyph())?;
                    }
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl Serialize for ExpressionNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExpressionNode::Group(g) => g.serialize(serializer),
            ExpressionNode::Comparison(c) => c.serialize(serializer),
        }
    }
}

impl Serialize for Group {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.connector.as_str(), &self.children)?;
        map.end()
    }
}

impl Serialize for Comparison {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&self.field)?;
        tuple.serialize_element(&self.operator)?;
        tuple.serialize_element(&self.value)?;
        tuple.end()
    }
}
