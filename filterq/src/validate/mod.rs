//! Literal validation and coercion against a field's declared constraints.
//!
//! A field may declare an allow-list of literal values, an ordered set of
//! accepted value types, both, or neither. Type sets are unions checked in
//! declaration order: the first type that matches wins, so `[date, null]`
//! keeps a `null` literal as `null`.

pub mod date;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{ConfigError, ValidationError};
use crate::expr::Literal;

/// Semantic types a field can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    Float,
    String,
    Bool,
    Null,
    /// Integer, float, or a string holding a number
    Numeric,
    /// Date string or Unix timestamp, coerced to [`Literal::DateTime`]
    Date,
}

impl ValueType {
    pub const ALL: [ValueType; 7] = [
        ValueType::Int,
        ValueType::Float,
        ValueType::String,
        ValueType::Bool,
        ValueType::Null,
        ValueType::Numeric,
        ValueType::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Bool => "bool",
            ValueType::Null => "null",
            ValueType::Numeric => "numeric",
            ValueType::Date => "date",
        }
    }

    /// Parse a `|`-separated union such as `date|null`.
    pub fn parse_union(spec: &str) -> Result<Vec<ValueType>, ConfigError> {
        spec.split('|').map(|part| part.trim().parse()).collect()
    }

    /// Check a literal against this type, returning the (possibly coerced)
    /// literal on a match.
    fn accept(&self, literal: &Literal, now: DateTime<Utc>) -> Option<Literal> {
        let matched = match (self, literal) {
            (ValueType::Int, Literal::Integer(_))
            | (ValueType::Float, Literal::Float(_))
            | (ValueType::String, Literal::String(_))
            | (ValueType::Bool, Literal::Boolean(_))
            | (ValueType::Null, Literal::Null)
            | (ValueType::Numeric, Literal::Integer(_) | Literal::Float(_)) => true,
            (ValueType::Numeric, Literal::String(s)) => is_numeric_str(s),
            (ValueType::Date, Literal::String(s)) => {
                return date::parse_date(s, now).map(Literal::DateTime);
            }
            (ValueType::Date, Literal::Integer(secs)) => {
                return date::from_timestamp(*secs).map(Literal::DateTime);
            }
            (ValueType::Date, Literal::DateTime(_)) => true,
            _ => false,
        };

        matched.then(|| literal.clone())
    }
}

impl FromStr for ValueType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownValueType(s.to_string()))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed view of the constraints declared for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldConstraint<'a> {
    /// Field name, used in error messages
    pub field: &'a str,
    /// Allow-list of literal values
    pub values: Option<&'a [Literal]>,
    /// Accepted types, in priority order
    pub types: Option<&'a [ValueType]>,
}

impl<'a> FieldConstraint<'a> {
    /// A constraint that accepts anything.
    pub fn unconstrained(field: &'a str) -> Self {
        Self {
            field,
            values: None,
            types: None,
        }
    }
}

/// Validate a literal, resolving relative dates against the current time.
pub fn validate(constraint: &FieldConstraint<'_>, literal: Literal) -> Result<Literal, ValidationError> {
    validate_at(constraint, literal, Utc::now())
}

/// Validate a literal, resolving relative dates against `now`.
pub fn validate_at(
    constraint: &FieldConstraint<'_>,
    literal: Literal,
    now: DateTime<Utc>,
) -> Result<Literal, ValidationError> {
    if let Some(values) = constraint.values {
        if !values.iter().any(|allowed| allowed.same_value(&literal)) {
            let allowed = values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ValidationError::ValueNotAllowed {
                field: constraint.field.to_string(),
                allowed,
                given: literal.to_string(),
            });
        }
    }

    if let Some(types) = constraint.types {
        return types
            .iter()
            .find_map(|ty| ty.accept(&literal, now))
            .ok_or_else(|| ValidationError::TypeMismatch {
                field: constraint.field.to_string(),
                expected: types
                    .iter()
                    .map(ValueType::as_str)
                    .collect::<Vec<_>>()
                    .join("|"),
            });
    }

    Ok(literal)
}

/// Whether a string holds a number: optional surrounding whitespace, sign,
/// digits with an optional fraction, and an optional exponent.
pub fn is_numeric_str(s: &str) -> bool {
    let bytes = s.trim().as_bytes();
    let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let mut i = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = digits(i);
    i += int_digits;

    let mut frac_digits = 0;
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        frac_digits = digits(i);
        i += frac_digits;
    }

    if int_digits + frac_digits == 0 {
        return false;
    }

    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exp_digits = digits(i);
        if exp_digits == 0 {
            return false;
        }
        i += exp_digits;
    }

    i == bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap()
    }

    fn check(values: Option<&[Literal]>, types: Option<&[ValueType]>, literal: Literal) -> Result<Literal, ValidationError> {
        let constraint = FieldConstraint {
            field: "test",
            values,
            types,
        };
        validate_at(&constraint, literal, now())
    }

    #[test]
    fn test_unconstrained_passes_through() {
        let constraint = FieldConstraint::unconstrained("test");
        assert_eq!(
            validate(&constraint, Literal::from("anything")).unwrap(),
            Literal::from("anything")
        );
    }

    #[test]
    fn test_allow_list() {
        let allowed = [Literal::Integer(200), Literal::Integer(250)];
        assert_eq!(check(Some(&allowed), None, Literal::Integer(250)).unwrap(), Literal::Integer(250));
    }

    #[test]
    fn test_allow_list_rejects() {
        let allowed = [Literal::Integer(200), Literal::Integer(300)];
        let err = check(Some(&allowed), None, Literal::Integer(250)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::ValueNotAllowed {
                field: "test".to_string(),
                allowed: "200, 300".to_string(),
                given: "250".to_string(),
            }
        );
    }

    #[test]
    fn test_allow_list_numeric_equality() {
        let allowed = [Literal::Integer(2)];
        assert!(check(Some(&allowed), None, Literal::Float(2.0)).is_ok());
        assert!(check(Some(&allowed), None, Literal::from("2")).is_err());
    }

    #[test]
    fn test_type_string() {
        let types = [ValueType::String];
        assert_eq!(check(None, Some(&types), Literal::from("some string")).unwrap(), Literal::from("some string"));
        assert!(matches!(
            check(None, Some(&types), Literal::Integer(300)),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_type_int() {
        let types = [ValueType::Int];
        assert_eq!(check(None, Some(&types), Literal::Integer(200)).unwrap(), Literal::Integer(200));
        assert!(check(None, Some(&types), Literal::from("string")).is_err());
    }

    #[test]
    fn test_type_float() {
        let types = [ValueType::Float];
        assert_eq!(check(None, Some(&types), Literal::Float(20.0)).unwrap(), Literal::Float(20.0));
        assert!(check(None, Some(&types), Literal::Integer(20)).is_err());
    }

    #[test]
    fn test_type_numeric() {
        let types = [ValueType::Numeric];
        assert_eq!(check(None, Some(&types), Literal::Integer(20)).unwrap(), Literal::Integer(20));
        assert_eq!(check(None, Some(&types), Literal::from("20")).unwrap(), Literal::from("20"));
        assert_eq!(check(None, Some(&types), Literal::Float(20.2)).unwrap(), Literal::Float(20.2));
        assert!(check(None, Some(&types), Literal::Null).is_err());
        assert!(check(None, Some(&types), Literal::from("twenty")).is_err());
    }

    #[test]
    fn test_type_bool() {
        let types = [ValueType::Bool];
        assert_eq!(check(None, Some(&types), Literal::Boolean(true)).unwrap(), Literal::Boolean(true));
        assert_eq!(check(None, Some(&types), Literal::Boolean(false)).unwrap(), Literal::Boolean(false));
        assert!(check(None, Some(&types), Literal::Null).is_err());
    }

    #[test]
    fn test_type_null() {
        let types = [ValueType::Null];
        assert_eq!(check(None, Some(&types), Literal::Null).unwrap(), Literal::Null);
        assert!(check(None, Some(&types), Literal::Integer(1220)).is_err());
    }

    #[test]
    fn test_type_date_coerces() {
        let types = [ValueType::Date];
        assert_eq!(
            check(None, Some(&types), Literal::from("2020-02-10")).unwrap(),
            Literal::DateTime(Utc.with_ymd_and_hms(2020, 2, 10, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_type_date_relative() {
        let types = [ValueType::Date];
        assert_eq!(
            check(None, Some(&types), Literal::from("yesterday")).unwrap(),
            Literal::DateTime(Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_type_date_unix() {
        let types = [ValueType::Date];
        assert_eq!(
            check(None, Some(&types), Literal::Integer(1649358544)).unwrap(),
            Literal::DateTime(Utc.with_ymd_and_hms(2022, 4, 7, 19, 9, 4).unwrap())
        );
    }

    #[test]
    fn test_type_date_invalid() {
        let types = [ValueType::Date];
        assert!(check(None, Some(&types), Literal::from("fslerklwao")).is_err());
        assert!(check(None, Some(&types), Literal::Boolean(true)).is_err());
    }

    #[test]
    fn test_union_keeps_declaration_order() {
        let types = [ValueType::Date, ValueType::Null];
        assert_eq!(check(None, Some(&types), Literal::Null).unwrap(), Literal::Null);

        let err = check(None, Some(&types), Literal::Boolean(true)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TypeMismatch {
                field: "test".to_string(),
                expected: "date|null".to_string(),
            }
        );
    }

    #[test]
    fn test_union_first_match_wins() {
        // A timestamp-shaped integer is an int first when int is listed first
        let types = [ValueType::Int, ValueType::Date];
        assert_eq!(check(None, Some(&types), Literal::Integer(1649358544)).unwrap(), Literal::Integer(1649358544));

        let types = [ValueType::Date, ValueType::Int];
        assert!(matches!(
            check(None, Some(&types), Literal::Integer(1649358544)).unwrap(),
            Literal::DateTime(_)
        ));
    }

    #[test]
    fn test_union_int_string() {
        let types = [ValueType::Int, ValueType::String];
        assert_eq!(check(None, Some(&types), Literal::from("string")).unwrap(), Literal::from("string"));
    }

    #[test]
    fn test_allow_list_and_types_both_apply() {
        let allowed = [Literal::from("2020-01-01")];
        let types = [ValueType::Date];
        assert!(matches!(
            check(Some(&allowed), Some(&types), Literal::from("2020-01-01")).unwrap(),
            Literal::DateTime(_)
        ));
        assert!(check(Some(&allowed), Some(&types), Literal::from("2021-01-01")).is_err());
    }

    #[test]
    fn test_parse_union() {
        assert_eq!(
            ValueType::parse_union("date|null").unwrap(),
            vec![ValueType::Date, ValueType::Null]
        );
        assert_eq!(
            ValueType::parse_union("uuid").unwrap_err(),
            ConfigError::UnknownValueType("uuid".to_string())
        );
    }

    #[test]
    fn test_is_numeric_str() {
        for s in ["20", "-20", "+1.5", ".5", "5.", "1e10", "1.5E-3", " 42 "] {
            assert!(is_numeric_str(s), "{}", s);
        }
        for s in ["", "-", ".", "1e", "abc", "12abc", "0x1A", "1 2"] {
            assert!(!is_numeric_str(s), "{}", s);
        }
    }
}
