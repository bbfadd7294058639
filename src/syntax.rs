// used when parsing a string to a DateTime<Utc>
use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::CoercionError;
use crate::value::{Value, ValueType};

lazy_static! {
    // a list literal is a bracketed, comma-separated sequence: [a, b, c]
    static ref LIST_FORM: Regex = Regex::new(r"(?s)^\s*\[(.*)\]\s*$").unwrap();
}

/// Turns text into typed values and back.
pub trait Syntax: Send + Sync {
    fn parse(&self, text: &str, target: &ValueType) -> Result<Value, CoercionError>;
    fn format(&self, value: &Value) -> String {
        value.to_string()
    }
}

/// Coerces text to `target`, handling the bracketed list form before handing
/// each scalar to `syntax`. `"[]"` and `"[ ]"` are empty lists.
///
/// List elements are split on every comma, so an element cannot itself
/// contain one. Lists of lists are refused.
pub fn coerce<S: Syntax + ?Sized>(syntax: &S, text: &str, target: &ValueType) -> Result<Value, CoercionError> {
    match target {
        ValueType::List { element } => parse_list(syntax, text, target, element).map(Value::List),
        _ => syntax.parse(text, target),
    }
}

fn parse_list<S: Syntax + ?Sized>(
    syntax: &S,
    text: &str,
    target: &ValueType,
    element: &ValueType,
) -> Result<Vec<Value>, CoercionError> {
    let captures = LIST_FORM
        .captures(text)
        .ok_or_else(|| CoercionError::new(text, target, "expected a bracketed list such as [a, b]"))?;
    if matches!(element, ValueType::List { .. }) {
        return Err(CoercionError::new(text, target, "nested lists are not supported"));
    }
    let content = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
    if content.is_empty() {
        return Ok(Vec::new());
    }
    content
        .split(',')
        .map(|item| coerce(syntax, item.trim(), element))
        .collect()
}

/// The built-in text forms for every scalar value type.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSyntax;

impl DefaultSyntax {
    fn parse_date(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(moment) = DateTime::parse_from_rfc3339(text) {
            return Some(moment.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|moment| moment.and_utc())
    }
}

impl Syntax for DefaultSyntax {
    fn parse(&self, text: &str, target: &ValueType) -> Result<Value, CoercionError> {
        let trimmed = text.trim();
        let fail = |reason: &str| CoercionError::new(text, target, reason);
        match target {
            ValueType::Boolean => match trimmed.to_lowercase().as_str() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(fail("expected true or false")),
            },
            ValueType::Integer => trimmed
                .parse::<i32>()
                .map(Value::Integer)
                .map_err(|e| fail(&e.to_string())),
            ValueType::Long => trimmed
                .parse::<i64>()
                .map(Value::Long)
                .map_err(|e| fail(&e.to_string())),
            ValueType::Double => trimmed
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| fail(&e.to_string())),
            ValueType::Text => Ok(Value::Text(text.to_string())),
            ValueType::Date => Self::parse_date(trimmed)
                .map(Value::Date)
                .ok_or_else(|| fail("expected an RFC 3339 timestamp or YYYY-MM-DD")),
            ValueType::Link => {
                if trimmed.is_empty() {
                    Err(fail("a link cannot be empty"))
                } else {
                    Ok(Value::Link(trimmed.to_string()))
                }
            }
            ValueType::Choice { options } => {
                if options.is_empty() || options.iter().any(|option| option == trimmed) {
                    Ok(Value::Choice(trimmed.to_string()))
                } else {
                    Err(fail(&format!("expected one of {}", options.join(", "))))
                }
            }
            ValueType::Model { .. } => Err(fail("models have no text form")),
            ValueType::List { element } => parse_list(self, text, target, element).map(Value::List),
            ValueType::Native { .. } => serde_json::from_str(trimmed)
                .map(Value::Native)
                .map_err(|e| fail(&e.to_string())),
        }
    }
}
