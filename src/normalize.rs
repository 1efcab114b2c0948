//! Currency normalization.
//!
//! Turns the heterogeneous `payload.Amount` values found in transaction logs
//! (plain numbers, `"USD 12,345.67"`, `"€1 000"`, `"-5"` ...) into a canonical
//! non-negative float. This is syntactic cleanup only: symbols and codes are
//! dropped and the number is taken at face value, no exchange rate is applied.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

static CURRENCY_CODE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{3}\s+").expect("currency code pattern is valid"));

const STRIPPED_CHARS: [char; 5] = ['$', '€', '£', ',', ' '];

/// A raw amount as it appears in a log record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawAmount<'a> {
    Null,
    Number(f64),
    Text(&'a str),
    /// Any JSON type that cannot carry an amount; holds the type name.
    Unsupported(&'static str),
}

impl<'a> RawAmount<'a> {
    pub fn from_json(value: &'a Value) -> Self {
        match value {
            Value::Null => RawAmount::Null,
            Value::Number(n) => n
                .as_f64()
                .map(RawAmount::Number)
                .unwrap_or(RawAmount::Unsupported("number")),
            Value::String(s) => RawAmount::Text(s),
            Value::Bool(_) => RawAmount::Unsupported("bool"),
            Value::Array(_) => RawAmount::Unsupported("array"),
            Value::Object(_) => RawAmount::Unsupported("object"),
        }
    }
}

/// The amount was present but could not be read as a number.
///
/// Distinct from `Ok(0.0)`, which means "absent or empty".
#[derive(Debug, Clone, PartialEq, Error)]
#[error("could not convert amount {raw} to a number")]
pub struct Unparseable {
    pub raw: String,
}

impl Unparseable {
    fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// Normalize a raw amount into a non-negative float.
pub fn normalize(amount: RawAmount<'_>) -> Result<f64, Unparseable> {
    match amount {
        RawAmount::Null => Ok(0.0),
        RawAmount::Number(n) if n.is_finite() => Ok(clamp_negative(n)),
        RawAmount::Number(n) => Err(Unparseable::new(n.to_string())),
        RawAmount::Text(text) => normalize_text(text),
        RawAmount::Unsupported(kind) => Err(Unparseable::new(format!("<{kind}>"))),
    }
}

/// Convenience wrapper over [`normalize`] for a JSON value.
pub fn normalize_value(value: &Value) -> Result<f64, Unparseable> {
    normalize(RawAmount::from_json(value))
}

fn normalize_text(text: &str) -> Result<f64, Unparseable> {
    let trimmed = text.trim();
    let without_code = CURRENCY_CODE_PREFIX.replace(trimmed, "");
    let digits: String = without_code
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect();

    if digits.is_empty() {
        return Ok(0.0);
    }

    let parsed: f64 = digits
        .parse()
        .map_err(|_| Unparseable::new(format!("{text:?}")))?;
    if !parsed.is_finite() {
        return Err(Unparseable::new(format!("{text:?}")));
    }
    Ok(clamp_negative(parsed))
}

// Also folds -0.0 into 0.0.
fn clamp_negative(value: f64) -> f64 {
    if value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_and_empty_amounts_are_zero() {
        assert_eq!(normalize(RawAmount::Null), Ok(0.0));
        assert_eq!(normalize(RawAmount::Text("")), Ok(0.0));
        assert_eq!(normalize(RawAmount::Text("   ")), Ok(0.0));
        assert_eq!(normalize(RawAmount::Text("$")), Ok(0.0));
    }

    #[test]
    fn negative_amounts_clamp_to_zero() {
        assert_eq!(normalize(RawAmount::Number(-12.5)), Ok(0.0));
        assert_eq!(normalize(RawAmount::Text("-5")), Ok(0.0));
        assert_eq!(normalize(RawAmount::Text("USD -1,200.00")), Ok(0.0));
        assert_eq!(normalize(RawAmount::Number(-0.0)), Ok(0.0));
    }

    #[test]
    fn numbers_pass_through() {
        assert_eq!(normalize_value(&json!(42)), Ok(42.0));
        assert_eq!(normalize_value(&json!(19.99)), Ok(19.99));
        assert_eq!(normalize_value(&json!(0)), Ok(0.0));
    }

    #[test]
    fn currency_codes_symbols_and_separators_are_stripped() {
        assert_eq!(normalize(RawAmount::Text("USD 12,345.67")), Ok(12345.67));
        assert_eq!(normalize(RawAmount::Text("€1 000")), Ok(1000.0));
        assert_eq!(normalize(RawAmount::Text("£7.50")), Ok(7.5));
        assert_eq!(normalize(RawAmount::Text("  $1,000,000 ")), Ok(1_000_000.0));
        assert_eq!(normalize(RawAmount::Text("EUR\t99")), Ok(99.0));
        assert_eq!(normalize(RawAmount::Text("1e3")), Ok(1000.0));
    }

    #[test]
    fn code_without_separator_is_not_stripped() {
        assert!(normalize(RawAmount::Text("USD12")).is_err());
        // Lowercase codes are not currency codes
        assert!(normalize(RawAmount::Text("usd 12")).is_err());
    }

    #[test]
    fn malformed_amounts_are_unparseable_not_zero() {
        let err = normalize(RawAmount::Text("abc")).unwrap_err();
        assert_eq!(err.raw, "\"abc\"");
        assert!(normalize(RawAmount::Text("12.3.4")).is_err());
        assert!(normalize(RawAmount::Text("inf")).is_err());
        assert!(normalize(RawAmount::Text("NaN")).is_err());
    }

    #[test]
    fn unsupported_types_are_unparseable() {
        assert!(normalize_value(&json!(true)).is_err());
        assert!(normalize_value(&json!([1, 2])).is_err());
        assert!(normalize_value(&json!({"value": 3})).is_err());
    }
}
