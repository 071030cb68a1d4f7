//! Configuration for FilterQ.
//!
//! Config file resolution order:
//! 1. Explicit path (`--config`)
//! 2. FILTERQ_CONFIG environment variable
//! 3. Default: `filterq.toml` in the platform config directory

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::expr::{Literal, ParseOptions, DEFAULT_MAX_DEPTH};
use crate::filter::Filter;
use crate::registry::{FieldDescriptor, FieldRegistry, OperatorRegistry};
use crate::sql::JoinClause;
use crate::validate::ValueType;
use crate::{Error, Result};

const CONFIG_FILE: &str = "filterq.toml";

/// Registries and parser switches loaded from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Reject stray characters in expressions.
    #[serde(default)]
    pub strict: bool,

    /// Maximum group nesting depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Default operators to drop.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_operators: Vec<String>,

    /// Extra operators, symbol to SQL.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub operators: BTreeMap<String, String>,

    /// Filterable fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldConfig>,
}

/// One `[[fields]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operators: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_operators: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<toml::Value>>,

    /// Type names or unions such as `date|null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinClause>,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict: false,
            max_depth: default_max_depth(),
            remove_operators: Vec::new(),
            operators: BTreeMap::new(),
            fields: Vec::new(),
        }
    }
}

impl Config {
    /// Load from `explicit` if given, otherwise from the resolved default
    /// location. Only a missing default file falls back to an empty config.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        match resolve_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            Some(path) => {
                debug!(path = %path.display(), "no config file, using empty configuration");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Load config from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        info!(
            path = %path.display(),
            fields = config.fields.len(),
            operators = config.operators.len(),
            "loaded filter configuration"
        );
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        if config.max_depth < 1 {
            return Err(Error::Config(format!(
                "max_depth must be at least 1, got {}",
                config.max_depth
            )));
        }
        Ok(config)
    }

    /// Save config to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            strict: self.strict,
            max_depth: self.max_depth,
        }
    }

    pub fn field_registry(&self) -> Result<FieldRegistry> {
        let mut registry = FieldRegistry::new();
        for field in &self.fields {
            registry.insert(field.to_descriptor()?);
        }
        Ok(registry)
    }

    /// Default operators, minus `remove_operators`, plus `operators`.
    pub fn operator_registry(&self) -> OperatorRegistry {
        let mut registry = OperatorRegistry::default();
        for symbol in &self.remove_operators {
            registry.remove(symbol);
        }
        for (symbol, sql) in &self.operators {
            registry.add(symbol.as_str(), sql.as_str());
        }
        registry
    }

    /// A filter for `expression` using this configuration.
    pub fn filter(&self, expression: impl Into<String>) -> Result<Filter> {
        Ok(Filter::new()
            .expression(expression)
            .fields(self.field_registry()?)
            .operators(self.operator_registry())
            .options(self.parse_options()))
    }
}

impl FieldConfig {
    pub fn to_descriptor(&self) -> Result<FieldDescriptor> {
        let mut descriptor = FieldDescriptor::new(self.name.as_str())?;

        if let Some(column) = &self.column {
            descriptor.column(column.as_str());
        }
        if let Some(operators) = &self.operators {
            descriptor.operators(operators.clone());
        }
        if let Some(operators) = &self.exclude_operators {
            descriptor.exclude_operators(operators.clone());
        }
        if let Some(values) = &self.values {
            let literals = values
                .iter()
                .map(|value| literal_from_toml(&self.name, value))
                .collect::<Result<Vec<_>>>()?;
            descriptor.values(literals);
        }
        if let Some(types) = &self.types {
            let mut parsed = Vec::new();
            for spec in types {
                parsed.extend(ValueType::parse_union(spec)?);
            }
            descriptor.value_type_list(parsed);
        }
        if let Some(join) = &self.join {
            descriptor.join(join.clone());
        }

        Ok(descriptor)
    }
}

fn literal_from_toml(field: &str, value: &toml::Value) -> Result<Literal> {
    match value {
        toml::Value::String(s) => Ok(Literal::String(s.clone())),
        toml::Value::Integer(i) => Ok(Literal::Integer(*i)),
        toml::Value::Float(f) => Ok(Literal::Float(*f)),
        toml::Value::Boolean(b) => Ok(Literal::Boolean(*b)),
        toml::Value::Datetime(dt) => Ok(Literal::String(dt.to_string())),
        other => Err(Error::Config(format!(
            "Unsupported value for field '{}': {}",
            field, other
        ))),
    }
}

/// Resolve the default config file path.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Environment variable
    if let Ok(path) = std::env::var("FILTERQ_CONFIG") {
        return Some(PathBuf::from(path));
    }

    // 2. Platform config directory
    ProjectDirs::from("", "", "filterq").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::registry::Operator;
    use crate::sql::{JoinKind, SelectQuery};
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
strict = true
remove_operators = ["<"]

[operators]
"~" = "LIKE"

[[fields]]
name = "author.name"
column = "authors.name"
operators = ["=", "~"]
join = { table = "authors", first = "authors.id", second = "posts.author_id", kind = "left" }

[[fields]]
name = "status"
values = ["draft", "published"]

[[fields]]
name = "published"
types = ["date|null"]
exclude_operators = ["~"]
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.strict);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.field_registry().unwrap().is_empty());
    }

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert!(config.strict);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.fields.len(), 3);

        let join = config.fields[0].join.as_ref().unwrap();
        assert_eq!(join.operator, "=");
        assert_eq!(join.kind, JoinKind::Left);
    }

    #[test]
    fn test_registries_from_config() {
        let config = Config::from_toml(SAMPLE).unwrap();

        let operators = config.operator_registry();
        assert!(!operators.contains("<"));
        assert!(matches!(operators.get("~"), Some(Operator::Fixed(sql)) if sql == "LIKE"));

        let fields = config.field_registry().unwrap();
        let author = fields.get("author.name").unwrap();
        assert_eq!(author.column_name(), "authors.name");
        assert!(author.operator_permitted("~"));
        assert!(!author.operator_permitted("!="));

        let published = fields.get("published").unwrap();
        assert_eq!(
            published.accepted_types().unwrap(),
            [ValueType::Date, ValueType::Null]
        );
    }

    #[test]
    fn test_filter_from_config() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let filter = config.filter("author.name~'%ann%'&status=draft").unwrap();

        let mut query = SelectQuery::table("posts");
        filter.apply(&mut query).unwrap();

        let (sql, bindings) = query.to_sql();
        assert_eq!(
            sql,
            "select * from \"posts\" left join \"authors\" on \"authors\".\"id\" = \"posts\".\"author_id\" where (\"authors\".\"name\" LIKE ? and \"status\" = ?)"
        );
        assert_eq!(bindings, vec![Literal::from("%ann%"), Literal::from("draft")]);
    }

    #[test]
    fn test_invalid_field_config() {
        let config = Config::from_toml("[[fields]]\nname = \"bad name\"\n").unwrap();
        assert!(matches!(
            config.field_registry().unwrap_err(),
            Error::Registry(ConfigError::InvalidFieldName(_))
        ));

        let config = Config::from_toml("[[fields]]\nname = \"x\"\ntypes = [\"uuid\"]\n").unwrap();
        assert!(matches!(
            config.field_registry().unwrap_err(),
            Error::Registry(ConfigError::UnknownValueType(_))
        ));

        let config = Config::from_toml("[[fields]]\nname = \"x\"\nvalues = [[1, 2]]\n").unwrap();
        assert!(matches!(config.field_registry().unwrap_err(), Error::Config(_)));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            Config::from_toml("fields = 3").unwrap_err(),
            Error::Config(_)
        ));
    }

    #[test]
    fn test_zero_max_depth_rejected() {
        let err = Config::from_toml("max_depth = 0").unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("max_depth")));

        let config = Config::from_toml("max_depth = 1").unwrap();
        assert_eq!(config.parse_options().max_depth, 1);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);

        let config = Config::from_toml(SAMPLE).unwrap();
        config.save(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nope.toml");
        assert!(matches!(
            Config::load(Some(&path)).unwrap_err(),
            Error::ConfigNotFound(p) if p == path
        ));
    }
}
