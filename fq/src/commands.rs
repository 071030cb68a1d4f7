//! CLI command implementations.

use std::path::Path;

use filterq::registry::Join;
use filterq::{Config, ExpressionNode, SelectQuery};

use crate::TreeFormat;

/// Print the parsed tree of an expression.
///
/// Parser switches come from the config; `strict` forces strict mode on.
pub fn parse(
    expression: &str,
    format: TreeFormat,
    strict: bool,
    config_path: Option<&Path>,
) -> filterq::Result<()> {
    let mut options = Config::load(config_path)?.parse_options();
    options.strict |= strict;
    let tree = filterq::parse_with(expression, &options)?;

    match format {
        TreeFormat::Json => println!("{}", serde_json::to_string_pretty(&tree)?),
        TreeFormat::Tree => {
            let mut out = String::new();
            render_tree(&tree, 0, &mut out);
            print!("{}", out);
        }
        TreeFormat::Expr => println!("{}", tree),
    }

    Ok(())
}

fn render_tree(node: &ExpressionNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match node {
        ExpressionNode::Group(group) => {
            out.push_str(&format!("{}{}\n", indent, group.connector));
            for child in &group.children {
                render_tree(child, depth + 1, out);
            }
        }
        ExpressionNode::Comparison(c) => {
            let value = serde_json::to_string(&c.value).unwrap_or_else(|_| c.value.to_string());
            out.push_str(&format!("{}{} {} {}\n", indent, c.field, c.operator, value));
        }
    }
}

/// Resolve and validate every comparison without producing SQL.
pub fn check(expression: &str, config_path: Option<&Path>) -> filterq::Result<()> {
    let config = Config::load(config_path)?;
    let count = config.filter(expression)?.check()?;
    println!("ok: {} comparison{}", count, if count == 1 { "" } else { "s" });
    Ok(())
}

/// Compile an expression against `table` and print the statement.
pub fn sql(expression: &str, table: &str, text: bool, config_path: Option<&Path>) -> filterq::Result<()> {
    let config = Config::load(config_path)?;
    let filter = config.filter(expression)?;

    let mut query = SelectQuery::table(table);
    filter.apply(&mut query)?;
    let (sql, bindings) = query.to_sql();

    if text {
        println!("{}", sql);
        for (i, binding) in bindings.iter().enumerate() {
            println!("  {}: {}", i + 1, serde_json::to_string(binding)?);
        }
    } else {
        let output = serde_json::json!({
            "sql": sql,
            "bindings": bindings,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(())
}

/// List the fields a configuration allows.
pub fn fields(config_path: Option<&Path>) -> filterq::Result<()> {
    let config = Config::load(config_path)?;
    let registry = config.field_registry()?;

    if registry.is_empty() {
        println!("No fields configured");
        return Ok(());
    }

    for field in registry.iter() {
        println!("{}", field.name());
        if field.column_name() != field.name() {
            println!("  column:    {}", field.column_name());
        }
        if let Some(ops) = field.included_operators() {
            println!("  operators: {}", ops.join(" "));
        }
        if let Some(ops) = field.excluded_operators() {
            println!("  excluded:  {}", ops.join(" "));
        }
        if let Some(types) = field.accepted_types() {
            let names: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
            println!("  types:     {}", names.join("|"));
        }
        if let Some(values) = field.allowed_values() {
            let values: Vec<String> = values.iter().map(ToString::to_string).collect();
            println!("  values:    {}", values.join(", "));
        }
        match field.join_hook() {
            Some(Join::Table(clause)) => println!("  join:      {}", clause.table),
            Some(Join::Custom(_)) => println!("  join:      (custom)"),
            None => {}
        }
    }

    Ok(())
}
