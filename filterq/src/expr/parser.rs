//! Recursive-descent parser for filter expressions.

use tracing::{debug, trace};

use super::node::{Comparison, Connector, ExpressionNode, Group, Literal};
use crate::error::ParseError;

/// Relational operators, longest first so `>=` wins over `>`.
const FIXED_OPERATORS: [&str; 6] = ["!=", ">=", "<=", "=", ">", "<"];

/// Characters a one- or two-character custom operator may be built from.
/// Never the connectors `&`/`|` or the group delimiters.
const CUSTOM_OPERATOR_CHARS: &[u8] = b"!@#$%^*~`?";

const KEYWORDS: [&str; 3] = ["true", "false", "null"];

/// Default limit on group nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Parser behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Reject characters that do not start a group, comparison or connector
    /// instead of skipping them.
    pub strict: bool,
    /// Maximum group nesting depth, including the outermost group.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    #[inline]
    fn default() -> Self {
        Self {
            strict: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    /// Options with stray-character rejection turned on.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }
}

/// Parse an expression with default options.
pub fn parse(expression: &str) -> Result<ExpressionNode, ParseError> {
    parse_with(expression, &ParseOptions::default())
}

/// Parse an expression into a tree rooted at a [`Group`].
pub fn parse_with(expression: &str, options: &ParseOptions) -> Result<ExpressionNode, ParseError> {
    let input = normalize(expression);
    let mut parser = Parser {
        input: &input,
        pos: 0,
        depth: 0,
        options,
    };

    let root = parser.parse_group()?;

    // Leftovers after the root group, e.g. `(a=1))`
    parser.skip_whitespace();
    if let Some(c) = parser.peek() {
        return Err(ParseError::UnexpectedCharacter {
            character: c,
            position: parser.pos,
        });
    }

    let root = ExpressionNode::Group(root);
    debug!(
        comparisons = root.comparisons().len(),
        depth = root.depth(),
        "parsed filter expression"
    );
    Ok(root)
}

/// Trim the input and wrap it in parentheses unless one balanced group
/// already spans all of it.
///
/// `(a=1)|(b=2)` starts and ends with a parenthesis but is two groups, so it
/// gets wrapped. Parentheses inside quoted literals are not counted.
pub fn normalize(expression: &str) -> String {
    let trimmed = expression.trim();
    if is_single_group(trimmed) {
        trimmed.to_string()
    } else {
        format!("({})", trimmed)
    }
}

fn is_single_group(input: &str) -> bool {
    if !input.starts_with('(') {
        return false;
    }

    let mut depth = 0usize;
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            // Quoted text never counts toward balance
            '\'' => loop {
                match chars.next() {
                    None => return false,
                    Some((_, '\'')) => break,
                    Some((_, '\\')) => {
                        chars.next();
                    }
                    Some(_) => {}
                }
            },
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    // The first group closed; it must be the whole input
                    return i + 1 == input.len();
                }
            }
            _ => {}
        }
    }

    false
}

/// Cursor over one normalized expression. Lives for a single parse call.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
    options: &'a ParseOptions,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Parse one `( ... )` scope. The cursor must be at the opening
    /// parenthesis (after optional whitespace).
    fn parse_group(&mut self) -> Result<Group, ParseError> {
        self.skip_whitespace();
        let open = self.pos;
        debug_assert_eq!(self.peek(), Some('('));
        self.bump();

        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(ParseError::NestingTooDeep {
                limit: self.options.max_depth,
            });
        }

        let mut connector: Option<Connector> = None;
        let mut children = Vec::new();

        loop {
            self.skip_whitespace();

            let c = match self.peek() {
                None => return Err(ParseError::UnclosedGroup { position: open }),
                Some(')') => break,
                Some(c) => c,
            };

            if c == '(' {
                let group = self.parse_group()?;
                children.push(ExpressionNode::Group(group));
                continue;
            }

            // A field name is never mistaken for a connector or stray text
            if let Some(comparison) = self.parse_comparison()? {
                children.push(ExpressionNode::Comparison(comparison));
                continue;
            }

            match c {
                '&' => self.set_connector(&mut connector, Connector::And)?,
                '|' => self.set_connector(&mut connector, Connector::Or)?,
                _ if self.options.strict => {
                    return Err(ParseError::UnexpectedCharacter {
                        character: c,
                        position: self.pos,
                    });
                }
                _ => {
                    trace!(character = %c, position = self.pos, "skipping stray character");
                    self.bump();
                }
            }
        }

        // Closing )
        self.bump();
        self.depth -= 1;

        Ok(Group {
            connector: connector.unwrap_or(Connector::And),
            children,
        })
    }

    /// Record the connector at the cursor for the current scope and step over it.
    fn set_connector(
        &mut self,
        current: &mut Option<Connector>,
        next: Connector,
    ) -> Result<(), ParseError> {
        if current.is_some_and(|existing| existing != next) {
            return Err(ParseError::MixedLogicWithoutGrouping { position: self.pos });
        }
        *current = Some(next);
        self.pos += 1;
        Ok(())
    }

    /// Try to read `field<op>value` at the cursor.
    ///
    /// Returns `Ok(None)` without moving when there is no field followed by an
    /// operator. Once the head matched, a missing value is an error.
    fn parse_comparison(&mut self) -> Result<Option<Comparison>, ParseError> {
        let rest = self.rest();

        let field_len = rest.bytes().take_while(|b| is_field_byte(*b)).count();
        if field_len == 0 {
            return Ok(None);
        }

        let after_field = &rest[field_len..];
        let after_space = after_field.trim_start_matches(|c: char| c.is_ascii_whitespace());
        let Some(op_len) = match_operator(after_space) else {
            return Ok(None);
        };

        let field = rest[..field_len].to_string();
        let operator = after_space[..op_len].to_string();
        self.pos += field_len + (after_field.len() - after_space.len()) + op_len;

        match self.parse_value()? {
            Some(value) => Ok(Some(Comparison {
                field,
                operator,
                value,
            })),
            None => Err(ParseError::MissingValue {
                field,
                position: self.pos,
            }),
        }
    }

    /// Literal sub-parsers, in order: number, quoted string, keyword, bare
    /// string. The first match wins.
    fn parse_value(&mut self) -> Result<Option<Literal>, ParseError> {
        self.skip_whitespace();

        let value = match self.parse_number() {
            Some(number) => Some(number),
            None => match self.parse_quoted()? {
                Some(text) => Some(text),
                None => self.parse_keyword().or_else(|| self.parse_bare()),
            },
        };

        if value.is_some() {
            self.skip_whitespace();
        }
        Ok(value)
    }

    /// `-?\d+(\.\d+)?`
    fn parse_number(&mut self) -> Option<Literal> {
        let rest = self.rest();
        let bytes = rest.as_bytes();

        let mut len = usize::from(bytes.first() == Some(&b'-'));
        let int_digits = count_digits(&bytes[len..]);
        if int_digits == 0 {
            return None;
        }
        len += int_digits;

        let mut fractional = false;
        if bytes.get(len) == Some(&b'.') {
            let frac_digits = count_digits(&bytes[len + 1..]);
            if frac_digits > 0 {
                len += 1 + frac_digits;
                fractional = true;
            }
        }

        let text = &rest[..len];
        let literal = if fractional {
            Literal::Float(text.parse().ok()?)
        } else {
            match text.parse::<i64>() {
                Ok(i) => Literal::Integer(i),
                // Out of i64 range
                Err(_) => Literal::Float(text.parse().ok()?),
            }
        };

        self.pos += len;
        Some(literal)
    }

    /// `'...'` with `\'` and `\\` escapes. Any other escaped character is
    /// taken as-is without the backslash.
    fn parse_quoted(&mut self) -> Result<Option<Literal>, ParseError> {
        if self.peek() != Some('\'') {
            return Ok(None);
        }

        let start = self.pos;
        self.bump();

        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::UnterminatedString { position: start }),
                Some('\'') => return Ok(Some(Literal::String(text))),
                Some('\\') => match self.bump() {
                    Some(escaped) => text.push(escaped),
                    None => return Err(ParseError::UnterminatedString { position: start }),
                },
                Some(c) => text.push(c),
            }
        }
    }

    /// `true`, `false` or `null`, only as a whole word.
    fn parse_keyword(&mut self) -> Option<Literal> {
        let rest = self.rest();
        let len = bare_word_len(rest);

        let literal = match &rest[..len] {
            "true" => Literal::Boolean(true),
            "false" => Literal::Boolean(false),
            "null" => Literal::Null,
            _ => return None,
        };

        self.pos += len;
        Some(literal)
    }

    /// `[A-Za-z_][A-Za-z0-9_-]*`, except the keywords.
    fn parse_bare(&mut self) -> Option<Literal> {
        let rest = self.rest();
        let first = *rest.as_bytes().first()?;
        if !(first.is_ascii_alphabetic() || first == b'_') {
            return None;
        }

        let word = &rest[..bare_word_len(rest)];
        if KEYWORDS.contains(&word) {
            return None;
        }

        self.pos += word.len();
        Some(Literal::String(word.to_string()))
    }
}

/// Whether a byte may appear in a field name (`[A-Za-z0-9_.]`).
pub(crate) fn is_field_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

fn is_bare_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn bare_word_len(input: &str) -> usize {
    input.bytes().take_while(|b| is_bare_word_byte(*b)).count()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Length of the operator at the start of `input`, if any.
fn match_operator(input: &str) -> Option<usize> {
    if let Some(op) = FIXED_OPERATORS.iter().find(|op| input.starts_with(*op)) {
        return Some(op.len());
    }

    let len = input
        .bytes()
        .take(2)
        .take_while(|b| CUSTOM_OPERATOR_CHARS.contains(b))
        .count();
    (len > 0).then_some(len)
}
