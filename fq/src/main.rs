//! fq: FilterQ - inspect, validate and compile filter expressions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(name = "fq")]
#[command(about = "FilterQ - parse filter expressions and compile them to SQL")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $FILTERQ_CONFIG, then the platform config dir)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Log more (-v info, -vv debug); RUST_LOG overrides
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an expression and print its tree
    #[command(visible_alias = "p")]
    Parse {
        /// Filter expression, e.g. "status=active&(views>10|featured=true)"
        expression: String,

        /// Output format
        #[arg(short = 'f', long = "format", value_enum, default_value = "json")]
        format: TreeFormat,

        /// Reject stray characters instead of skipping them
        #[arg(short = 's', long = "strict")]
        strict: bool,
    },

    /// Resolve every comparison against the configured fields and operators
    Check {
        /// Filter expression
        expression: String,
    },

    /// Compile an expression into a SELECT statement
    Sql {
        /// Filter expression
        expression: String,

        /// Table to select from
        #[arg(short = 't', long = "table")]
        table: String,

        /// Print SQL and bindings as plain text instead of JSON
        #[arg(long = "text")]
        text: bool,
    },

    /// List configured fields
    Fields,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TreeFormat {
    /// Nested JSON: groups as {"and": [...]}, comparisons as [field, op, value]
    Json,
    /// Indented outline
    Tree,
    /// Fully parenthesized expression
    Expr,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Parse { expression, format, strict } => commands::parse(&expression, format, strict, config),
        Commands::Check { expression } => commands::check(&expression, config),
        Commands::Sql { expression, table, text } => commands::sql(&expression, &table, text, config),
        Commands::Fields => commands::fields(config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
