use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::expr::{is_field_byte, Literal};
use crate::sql::{JoinClause, SelectQuery};
use crate::validate::{FieldConstraint, ValueType};

/// Adds the joins a field needs to the query being filtered.
pub type JoinHook = Arc<dyn Fn(&mut SelectQuery) + Send + Sync>;

#[derive(Clone)]
pub enum Join {
    Table(JoinClause),
    Custom(JoinHook),
}

impl Join {
    pub fn apply(&self, query: &mut SelectQuery) {
        match self {
            Join::Table(clause) => {
                query.join(clause.clone());
            }
            Join::Custom(hook) => hook(query),
        }
    }
}

impl fmt::Debug for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Join::Table(clause) => f.debug_tuple("Table").field(clause).finish(),
            Join::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Operator symbols given either as a list or a comma-separated string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorList(Vec<String>);

impl From<&str> for OperatorList {
    fn from(spec: &str) -> Self {
        Self(
            spec.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }
}

impl From<Vec<String>> for OperatorList {
    fn from(list: Vec<String>) -> Self {
        Self(list)
    }
}

impl From<Vec<&str>> for OperatorList {
    fn from(list: Vec<&str>) -> Self {
        Self(list.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for OperatorList {
    fn from(list: [&str; N]) -> Self {
        Self(list.into_iter().map(String::from).collect())
    }
}

/// Filtering rules for one field name.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    column: Option<String>,
    included_operators: Option<Vec<String>>,
    excluded_operators: Option<Vec<String>>,
    values: Option<Vec<Literal>>,
    types: Option<Vec<ValueType>>,
    join: Option<Join>,
}

impl FieldDescriptor {
    /// Create an unconstrained descriptor. Names must match `[A-Za-z0-9_.]+`.
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.is_empty() || !name.bytes().all(is_field_byte) {
            return Err(ConfigError::InvalidFieldName(name));
        }

        Ok(Self {
            name,
            column: None,
            included_operators: None,
            excluded_operators: None,
            values: None,
            types: None,
            join: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column emitted for this field; defaults to the field name.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    pub fn included_operators(&self) -> Option<&[String]> {
        self.included_operators.as_deref()
    }

    pub fn excluded_operators(&self) -> Option<&[String]> {
        self.excluded_operators.as_deref()
    }

    pub fn allowed_values(&self) -> Option<&[Literal]> {
        self.values.as_deref()
    }

    pub fn accepted_types(&self) -> Option<&[ValueType]> {
        self.types.as_deref()
    }

    pub fn join_hook(&self) -> Option<&Join> {
        self.join.as_ref()
    }

    pub fn column(&mut self, column: impl Into<String>) -> &mut Self {
        self.column = Some(column.into());
        self
    }

    /// Restrict the field to these operators.
    pub fn operators(&mut self, operators: impl Into<OperatorList>) -> &mut Self {
        self.included_operators = Some(operators.into().0);
        self
    }

    /// Forbid these operators on the field.
    pub fn exclude_operators(&mut self, operators: impl Into<OperatorList>) -> &mut Self {
        self.excluded_operators = Some(operators.into().0);
        self
    }

    pub fn values<I, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Literal>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Accept values of a `|`-separated type union, e.g. `date|null`.
    pub fn value_types(&mut self, spec: &str) -> Result<&mut Self, ConfigError> {
        self.types = Some(ValueType::parse_union(spec)?);
        Ok(self)
    }

    pub fn value_type_list(&mut self, types: impl IntoIterator<Item = ValueType>) -> &mut Self {
        self.types = Some(types.into_iter().collect());
        self
    }

    pub fn join(&mut self, clause: JoinClause) -> &mut Self {
        self.join = Some(Join::Table(clause));
        self
    }

    pub fn join_with<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut SelectQuery) + Send + Sync + 'static,
    {
        self.join = Some(Join::Custom(Arc::new(hook)));
        self
    }

    /// Whether `symbol` passes the include and exclude lists.
    pub fn operator_permitted(&self, symbol: &str) -> bool {
        let included = self
            .included_operators
            .as_ref()
            .map_or(true, |ops| ops.iter().any(|op| op == symbol));
        let excluded = self
            .excluded_operators
            .as_ref()
            .is_some_and(|ops| ops.iter().any(|op| op == symbol));
        included && !excluded
    }

    pub fn constraint(&self) -> FieldConstraint<'_> {
        FieldConstraint {
            field: &self.name,
            values: self.values.as_deref(),
            types: self.types.as_deref(),
        }
    }
}

/// Fields a filter may reference, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: BTreeMap<String, FieldDescriptor>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, replacing any previous descriptor, and return it for
    /// further configuration.
    pub fn add(&mut self, name: impl Into<String>) -> Result<&mut FieldDescriptor, ConfigError> {
        let descriptor = FieldDescriptor::new(name)?;
        Ok(self.insert(descriptor))
    }

    pub fn insert(&mut self, descriptor: FieldDescriptor) -> &mut FieldDescriptor {
        match self.fields.entry(descriptor.name.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(descriptor);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(descriptor),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldDescriptor> {
        self.fields.remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_names() {
        for name in ["", "bad name", "a-b", "x;drop"] {
            assert_eq!(
                FieldDescriptor::new(name).unwrap_err(),
                ConfigError::InvalidFieldName(name.to_string())
            );
        }
        assert!(FieldDescriptor::new("author.name_2").is_ok());
    }

    #[test]
    fn test_column_defaults_to_name() {
        let mut field = FieldDescriptor::new("status").unwrap();
        assert_eq!(field.column_name(), "status");
        field.column("posts.status");
        assert_eq!(field.column_name(), "posts.status");
    }

    #[test]
    fn test_operator_lists() {
        let mut field = FieldDescriptor::new("id").unwrap();
        assert!(field.operator_permitted("~"));

        field.operators("=, !=");
        assert_eq!(field.included_operators().unwrap(), ["=", "!="]);
        assert!(field.operator_permitted("="));
        assert!(!field.operator_permitted(">"));

        field.operators(["=", ">"]).exclude_operators(vec![">"]);
        assert!(field.operator_permitted("="));
        assert!(!field.operator_permitted(">"));
    }

    #[test]
    fn test_exclude_only() {
        let mut field = FieldDescriptor::new("id").unwrap();
        field.exclude_operators("<");
        assert!(!field.operator_permitted("<"));
        assert!(field.operator_permitted("~"));
    }

    #[test]
    fn test_value_types() {
        let mut field = FieldDescriptor::new("published").unwrap();
        field.value_types("date|null").unwrap();
        assert_eq!(field.accepted_types().unwrap(), [ValueType::Date, ValueType::Null]);
        assert_eq!(
            field.value_types("date|uuid").unwrap_err(),
            ConfigError::UnknownValueType("uuid".to_string())
        );
    }

    #[test]
    fn test_constraint_view() {
        let mut field = FieldDescriptor::new("status").unwrap();
        field.values(["draft", "published"]);
        let constraint = field.constraint();
        assert_eq!(constraint.field, "status");
        assert_eq!(constraint.values.unwrap().len(), 2);
        assert!(constraint.types.is_none());
    }

    #[test]
    fn test_join_applies() {
        let mut field = FieldDescriptor::new("author.name").unwrap();
        field.join(JoinClause::new("authors", "authors.id", "=", "posts.author_id"));

        let mut query = SelectQuery::table("posts");
        field.join_hook().unwrap().apply(&mut query);
        assert_eq!(query.joins().len(), 1);

        field.join_with(|q| {
            q.join(JoinClause::new("tags", "tags.post_id", "=", "posts.id"));
        });
        field.join_hook().unwrap().apply(&mut query);
        assert_eq!(query.joins()[1].table, "tags");
    }

    #[test]
    fn test_registry_add_replaces() {
        let mut registry = FieldRegistry::new();
        registry.add("id").unwrap().column("posts.id");
        registry.add("id").unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("id").unwrap().column_name(), "id");
        assert!(registry.get("missing").is_none());
        assert!(registry.add("no spaces").is_err());
    }
}
