//! Filter expression parser.
//!
//! # Syntax Overview
//!
//! - **Comparisons**: `field<op>value`, e.g. `author.name='x'`, `age>=18`
//! - **Operators**: `=`, `!=`, `>`, `<`, `>=`, `<=`, or a one/two character
//!   custom symbol built from `!@#$%^*~?` and the backtick
//! - **Values**: numbers (`12`, `-2.5`), quoted strings (`'it\'s'`), bare
//!   words (`hello-world`), and `true`/`false`/`null`
//! - **Connectors**: `&` (AND) and `|` (OR); one kind per group
//! - **Groups**: `(...)` to mix connectors: `a=1&(b=2|c=3)`

mod node;
mod parser;

pub use node::{Comparison, Connector, ExpressionNode, Group, Literal};
pub use parser::{normalize, parse, parse_with, ParseOptions, DEFAULT_MAX_DEPTH};

pub(crate) use parser::is_field_byte;
