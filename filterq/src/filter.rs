//! Applying a parsed expression to a query.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::expr::{self, Comparison, Connector, ExpressionNode, Group, ParseOptions};
use crate::registry::{FieldDescriptor, FieldRegistry, Operator, OperatorRegistry};
use crate::sql::{SelectQuery, WhereGroup};
use crate::validate::validate_at;

/// An expression bound to the registries that resolve it.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    expression: String,
    fields: FieldRegistry,
    operators: OperatorRegistry,
    options: ParseOptions,
    now: Option<DateTime<Utc>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn fields(mut self, fields: FieldRegistry) -> Self {
        self.fields = fields;
        self
    }

    pub fn operators(mut self, operators: OperatorRegistry) -> Self {
        self.operators = operators;
        self
    }

    pub fn options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Fix the instant relative dates resolve against.
    pub fn now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn field_registry(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn operator_registry(&self) -> &OperatorRegistry {
        &self.operators
    }

    /// Parse the expression. Blank expressions yield `None`.
    pub fn parse(&self) -> Result<Option<ExpressionNode>> {
        if self.expression.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(expr::parse_with(&self.expression, &self.options)?))
    }

    /// Add the filter to `query` as one parenthesized group ANDed onto its
    /// existing conditions, plus any joins the referenced fields need.
    ///
    /// On error the query is left untouched.
    pub fn apply(&self, query: &mut SelectQuery) -> Result<()> {
        let Some(compiled) = self.compile()? else {
            debug!("empty filter expression, query unchanged");
            return Ok(());
        };

        for field in compiled.joins {
            if let Some(join) = field.join_hook() {
                debug!(field = field.name(), "joining for filter field");
                join.apply(query);
            }
        }

        query.wheres_mut().nested(Connector::And, compiled.group);
        Ok(())
    }

    /// Resolve every comparison without touching a query.
    ///
    /// Returns the number of comparisons that were checked.
    pub fn check(&self) -> Result<usize> {
        Ok(self.compile()?.map_or(0, |compiled| compiled.comparisons))
    }

    fn compile(&self) -> Result<Option<Compiled<'_>>> {
        let Some(tree) = self.parse()? else {
            return Ok(None);
        };

        debug!(expression = %tree, "applying filter");

        let now = self.now.unwrap_or_else(Utc::now);
        let mut joins = Vec::new();

        let group = match &tree {
            ExpressionNode::Group(group) => self.build_group(group, now, &mut joins)?,
            ExpressionNode::Comparison(comparison) => {
                let mut group = WhereGroup::new();
                self.emit_comparison(&mut group, Connector::And, comparison, now, &mut joins)?;
                group
            }
        };

        Ok(Some(Compiled {
            group,
            joins,
            comparisons: tree.comparisons().len(),
        }))
    }

    fn build_group<'a>(
        &'a self,
        group: &Group,
        now: DateTime<Utc>,
        joins: &mut Vec<&'a FieldDescriptor>,
    ) -> Result<WhereGroup> {
        let mut out = WhereGroup::new();

        for child in &group.children {
            match child {
                ExpressionNode::Group(inner) => {
                    let nested = self.build_group(inner, now, joins)?;
                    out.nested(group.connector, nested);
                }
                ExpressionNode::Comparison(comparison) => {
                    self.emit_comparison(&mut out, group.connector, comparison, now, joins)?;
                }
            }
        }

        Ok(out)
    }

    fn emit_comparison<'a>(
        &'a self,
        target: &mut WhereGroup,
        connector: Connector,
        comparison: &Comparison,
        now: DateTime<Utc>,
        joins: &mut Vec<&'a FieldDescriptor>,
    ) -> Result<()> {
        let field = self
            .fields
            .get(&comparison.field)
            .ok_or_else(|| ConfigError::UnknownField(comparison.field.clone()))?;

        let value = validate_at(&field.constraint(), comparison.value.clone(), now)?;

        let operator = self
            .operators
            .get(&comparison.operator)
            .ok_or_else(|| ConfigError::UnknownOperator(comparison.operator.clone()))?;

        if !field.operator_permitted(&comparison.operator) {
            return Err(ConfigError::OperatorNotPermittedForField {
                operator: comparison.operator.clone(),
                field: field.name().to_string(),
            }
            .into());
        }

        if field.join_hook().is_some() && !joins.iter().any(|f| f.name() == field.name()) {
            joins.push(field);
        }

        match operator {
            Operator::Fixed(sql) => {
                target.compare(connector, field.column_name(), sql.as_str(), value);
            }
            Operator::Custom(handler) => handler(target, connector, &value),
        }

        Ok(())
    }
}

/// A resolved filter, ready to be attached to a query.
struct Compiled<'a> {
    group: WhereGroup,
    /// Fields whose joins are needed, each listed once
    joins: Vec<&'a FieldDescriptor>,
    comparisons: usize,
}
