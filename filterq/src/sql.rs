//! Minimal `SELECT` builder that filters are emitted into.
//!
//! Column names and operators come from the registries, never from the
//! expression text; every value is passed as a positional `?` binding.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::expr::{Connector, Literal};

/// A `SELECT *` over one table with joins and a WHERE tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    table: String,
    joins: Vec<JoinClause>,
    wheres: WhereGroup,
}

/// `<kind> join <table> on <first> <operator> <second>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinClause {
    pub table: String,
    pub first: String,
    #[serde(default = "default_join_operator")]
    pub operator: String,
    pub second: String,
    #[serde(default)]
    pub kind: JoinKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
}

/// Ordered conditions, each attached with the connector that precedes it.
/// The first condition's connector is ignored when rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereGroup {
    conditions: Vec<(Connector, Condition)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `<column> <operator> ?`
    Compare {
        column: String,
        operator: String,
        value: Literal,
    },
    /// `<column> is [not] null`
    Null { column: String, negated: bool },
    /// Caller-provided SQL with its own bindings
    Raw { sql: String, bindings: Vec<Literal> },
    /// `( ... )`
    Nested(WhereGroup),
}

fn default_join_operator() -> String {
    "=".to_string()
}

impl JoinClause {
    pub fn new(
        table: impl Into<String>,
        first: impl Into<String>,
        operator: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            first: first.into(),
            operator: operator.into(),
            second: second.into(),
            kind: JoinKind::Inner,
        }
    }

    pub fn kind(mut self, kind: JoinKind) -> Self {
        self.kind = kind;
        self
    }
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "inner join",
            JoinKind::Left => "left join",
            JoinKind::Right => "right join",
        }
    }
}

impl SelectQuery {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            joins: Vec::new(),
            wheres: WhereGroup::new(),
        }
    }

    pub fn join(&mut self, clause: JoinClause) -> &mut Self {
        self.joins.push(clause);
        self
    }

    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    pub fn wheres(&self) -> &WhereGroup {
        &self.wheres
    }

    pub fn wheres_mut(&mut self) -> &mut WhereGroup {
        &mut self.wheres
    }

    /// Render the statement and its bindings in placeholder order.
    pub fn to_sql(&self) -> (String, Vec<Literal>) {
        let mut sql = format!("select * from {}", quote_identifier(&self.table));
        let mut bindings = Vec::new();

        for join in &self.joins {
            let _ = write!(
                sql,
                " {} {} on {} {} {}",
                join.kind.as_sql(),
                quote_identifier(&join.table),
                quote_identifier(&join.first),
                join.operator,
                quote_identifier(&join.second)
            );
        }

        if !self.wheres.is_empty() {
            sql.push_str(" where ");
            self.wheres.write_sql(&mut sql, &mut bindings);
        }

        (sql, bindings)
    }
}

impl WhereGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn conditions(&self) -> &[(Connector, Condition)] {
        &self.conditions
    }

    pub fn push(&mut self, connector: Connector, condition: Condition) -> &mut Self {
        self.conditions.push((connector, condition));
        self
    }

    /// Add `column operator value`. `=`/`!=` against `null` become
    /// `is null`/`is not null`.
    pub fn compare(
        &mut self,
        connector: Connector,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: Literal,
    ) -> &mut Self {
        let column = column.into();
        let operator = operator.into();

        let condition = match (operator.as_str(), &value) {
            ("=", Literal::Null) => Condition::Null {
                column,
                negated: false,
            },
            ("!=" | "<>", Literal::Null) => Condition::Null {
                column,
                negated: true,
            },
            _ => Condition::Compare {
                column,
                operator,
                value,
            },
        };
        self.push(connector, condition)
    }

    pub fn raw(
        &mut self,
        connector: Connector,
        sql: impl Into<String>,
        bindings: Vec<Literal>,
    ) -> &mut Self {
        self.push(
            connector,
            Condition::Raw {
                sql: sql.into(),
                bindings,
            },
        )
    }

    /// Add a parenthesized sub-group. Empty groups are dropped.
    pub fn nested(&mut self, connector: Connector, group: WhereGroup) -> &mut Self {
        if !group.is_empty() {
            self.push(connector, Condition::Nested(group));
        }
        self
    }

    fn write_sql(&self, sql: &mut String, bindings: &mut Vec<Literal>) {
        for (i, (connector, condition)) in self.conditions.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(connector.as_str());
                sql.push(' ');
            }

            match condition {
                Condition::Compare {
                    column,
                    operator,
                    value,
                } => {
                    let _ = write!(sql, "{} {} ?", quote_identifier(column), operator);
                    bindings.push(value.clone());
                }
                Condition::Null { column, negated } => {
                    let _ = write!(
                        sql,
                        "{} is {}null",
                        quote_identifier(column),
                        if *negated { "not " } else { "" }
                    );
                }
                Condition::Raw {
                    sql: raw,
                    bindings: raw_bindings,
                } => {
                    sql.push_str(raw);
                    bindings.extend(raw_bindings.iter().cloned());
                }
                Condition::Nested(group) => {
                    sql.push('(');
                    group.write_sql(sql, bindings);
                    sql.push(')');
                }
            }
        }
    }
}

/// Quote each dotted segment: `authors.name` -> `"authors"."name"`.
pub fn quote_identifier(identifier: &str) -> String {
    identifier
        .split('.')
        .map(|segment| {
            if segment == "*" {
                segment.to_string()
            } else {
                format!("\"{}\"", segment.replace('"', "\"\""))
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_select() {
        let (sql, bindings) = SelectQuery::table("posts").to_sql();
        assert_eq!(sql, "select * from \"posts\"");
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("authors.name"), "\"authors\".\"name\"");
        assert_eq!(quote_identifier("posts.*"), "\"posts\".*");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_where_connectors_and_nesting() {
        let mut inner = WhereGroup::new();
        inner
            .compare(Connector::Or, "b", "=", Literal::Integer(2))
            .compare(Connector::Or, "c", "<", Literal::Float(1.5));

        let mut query = SelectQuery::table("t");
        query
            .wheres_mut()
            .compare(Connector::And, "a", "=", Literal::from("x"))
            .nested(Connector::And, inner);

        let (sql, bindings) = query.to_sql();
        assert_eq!(
            sql,
            "select * from \"t\" where \"a\" = ? and (\"b\" = ? or \"c\" < ?)"
        );
        assert_eq!(
            bindings,
            vec![Literal::from("x"), Literal::Integer(2), Literal::Float(1.5)]
        );
    }

    #[test]
    fn test_null_comparisons() {
        let mut query = SelectQuery::table("t");
        query
            .wheres_mut()
            .compare(Connector::And, "a", "=", Literal::Null)
            .compare(Connector::Or, "b", "!=", Literal::Null)
            .compare(Connector::Or, "c", ">", Literal::Null);

        let (sql, bindings) = query.to_sql();
        assert_eq!(
            sql,
            "select * from \"t\" where \"a\" is null or \"b\" is not null or \"c\" > ?"
        );
        assert_eq!(bindings, vec![Literal::Null]);
    }

    #[test]
    fn test_raw_and_empty_nested() {
        let mut query = SelectQuery::table("t");
        query
            .wheres_mut()
            .nested(Connector::And, WhereGroup::new())
            .raw(
                Connector::And,
                "MATCH (title) AGAINST (?)",
                vec![Literal::from("hello")],
            );

        let (sql, bindings) = query.to_sql();
        assert_eq!(sql, "select * from \"t\" where MATCH (title) AGAINST (?)");
        assert_eq!(bindings, vec![Literal::from("hello")]);
    }

    #[test]
    fn test_joins() {
        let mut query = SelectQuery::table("posts");
        query.join(JoinClause::new("authors", "authors.id", "=", "posts.author_id").kind(JoinKind::Left));

        let (sql, _) = query.to_sql();
        assert_eq!(
            sql,
            "select * from \"posts\" left join \"authors\" on \"authors\".\"id\" = \"posts\".\"author_id\""
        );
    }
}
