//! Typed model of the engine's structured match expressions
//!
//! The engine echoes an added rule as an ordered list of expression terms.
//! This module types the right-hand operand shapes the decoder understands
//! ([`MatchValue`]) and renders them back into the flat string forms used by
//! [`crate::core::summary::RuleSummary`] fields. It also hosts the relaxed
//! literal parser for the JSON interchange format, which must accept both
//! single- and double-quoted string literals (other tooling emits the
//! single-quoted form).

use crate::core::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

/// A match expression term: `<left> <op> <right>`
///
/// `left` and `right` stay loosely typed here; the decoder narrows them to
/// [`PayloadField`] and [`MatchValue`] and reports a structured error for
/// anything it cannot narrow.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchExpr {
    pub op: String,
    pub left: Value,
    pub right: Value,
}

/// A payload field reference on the left side of a match, e.g. `ip saddr`
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadField {
    pub protocol: String,
    pub field: String,
}

/// An address prefix operand, e.g. `192.168.0.0/24`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Prefix {
    pub addr: String,
    pub len: u8,
}

/// Right-hand operand of a match expression
///
/// Covers the shapes the engine emits for the supported match categories:
/// literal scalars, two-ended ranges, anonymous sets (whose elements may
/// themselves be scalars or ranges) and address prefixes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MatchValue {
    Number(i64),
    Text(String),
    Range { range: Vec<MatchValue> },
    Set { set: Vec<MatchValue> },
    Prefix { prefix: Prefix },
}

impl MatchValue {
    /// Renders the operand into its flat string form.
    ///
    /// Scalars render as themselves, a range as `"lo-hi"`, a set as a
    /// comma-joined element list and a prefix as `"addr/len"`. Returns
    /// `None` for any shape outside that grammar (a range without exactly
    /// two scalar ends, a set containing an unrenderable element); the
    /// decoder turns that into an explicit error.
    pub fn render(&self) -> Option<String> {
        match self {
            MatchValue::Number(n) => Some(n.to_string()),
            MatchValue::Text(s) => Some(s.clone()),
            MatchValue::Range { range } => {
                if range.len() != 2 {
                    return None;
                }
                let lo = range[0].render_scalar()?;
                let hi = range[1].render_scalar()?;
                Some(format!("{lo}-{hi}"))
            }
            MatchValue::Set { set } => {
                let mut parts = Vec::with_capacity(set.len());
                for item in set {
                    // Ranges are allowed inside sets, nested sets are not
                    match item {
                        MatchValue::Set { .. } => return None,
                        _ => parts.push(item.render()?),
                    }
                }
                Some(parts.join(", "))
            }
            MatchValue::Prefix { prefix } => Some(format!("{}/{}", prefix.addr, prefix.len)),
        }
    }

    fn render_scalar(&self) -> Option<String> {
        match self {
            MatchValue::Number(n) => Some(n.to_string()),
            MatchValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Normalizes a relaxed interchange literal into strict JSON.
///
/// Accepted deviations from JSON: single-quoted string literals (with `\'`
/// escapes) and the bare words `None`, `True` and `False`. Double-quoted
/// strings and everything else pass through untouched.
///
/// # Errors
///
/// Returns [`Error::Literal`] on an unterminated string literal.
pub fn normalize_literal(literal: &str) -> Result<String> {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                out.push('"');
                let mut terminated = false;
                while let Some(inner) = chars.next() {
                    match inner {
                        '\'' => {
                            terminated = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            // \' unescapes, a literal " must gain an escape
                            Some('\'') => out.push('\''),
                            Some('"') => out.push_str("\\\""),
                            Some(other) => {
                                out.push('\\');
                                out.push(other);
                            }
                            None => return Err(unterminated()),
                        },
                        '"' => out.push_str("\\\""),
                        other => out.push(other),
                    }
                }
                if !terminated {
                    return Err(unterminated());
                }
                out.push('"');
            }
            '"' => {
                out.push('"');
                let mut terminated = false;
                while let Some(inner) = chars.next() {
                    out.push(inner);
                    match inner {
                        '"' => {
                            terminated = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some(escaped) => out.push(escaped),
                            None => return Err(unterminated()),
                        },
                        _ => {}
                    }
                }
                if !terminated {
                    return Err(unterminated());
                }
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::new();
                word.push(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "None" => out.push_str("null"),
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    _ => out.push_str(&word),
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

fn unterminated() -> Error {
    Error::Literal("unterminated string literal".to_string())
}

/// Parses a structured match-expression literal into its term list.
///
/// This is the entry point for callers holding the engine's expression as a
/// string (strict JSON or the relaxed single-quoted form) rather than as an
/// already-parsed value.
///
/// # Errors
///
/// Returns [`Error::Literal`] when the literal is malformed or is not a
/// list of expression terms.
pub fn parse_expr_literal(literal: &str) -> Result<Vec<Value>> {
    let normalized = normalize_literal(literal)?;
    serde_json::from_str(&normalized).map_err(|e| Error::Literal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(v: serde_json::Value) -> MatchValue {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_render_scalars() {
        assert_eq!(value(json!(8428)).render().unwrap(), "8428");
        assert_eq!(value(json!("10.28.1.97")).render().unwrap(), "10.28.1.97");
    }

    #[test]
    fn test_render_range() {
        let range = value(json!({"range": [8428, 8429]}));
        assert_eq!(range.render().unwrap(), "8428-8429");
    }

    #[test]
    fn test_render_range_wrong_arity() {
        let range = value(json!({"range": [8428]}));
        assert!(range.render().is_none());
        let range = value(json!({"range": [1, 2, 3]}));
        assert!(range.render().is_none());
    }

    #[test]
    fn test_render_set_with_nested_range() {
        let set = value(json!({"set": [123, {"range": [8428, 8429]}]}));
        assert_eq!(set.render().unwrap(), "123, 8428-8429");
    }

    #[test]
    fn test_render_nested_set_rejected() {
        let set = value(json!({"set": [{"set": [1, 2]}]}));
        assert!(set.render().is_none());
    }

    #[test]
    fn test_render_prefix() {
        let prefix = value(json!({"prefix": {"addr": "192.168.0.0", "len": 24}}));
        assert_eq!(prefix.render().unwrap(), "192.168.0.0/24");
    }

    #[test]
    fn test_unsupported_shape_fails_deserialization() {
        assert!(serde_json::from_value::<MatchValue>(json!(true)).is_err());
        assert!(serde_json::from_value::<MatchValue>(json!({"fib": {}})).is_err());
    }

    #[test]
    fn test_normalize_literal_single_quotes() {
        let normalized = normalize_literal("{'set': [123, {'range': [8428, 8429]}]}").unwrap();
        assert_eq!(normalized, r#"{"set": [123, {"range": [8428, 8429]}]}"#);
    }

    #[test]
    fn test_normalize_literal_python_words() {
        assert_eq!(normalize_literal("None").unwrap(), "null");
        assert_eq!(
            normalize_literal("{'ipv6': False, 'x': True}").unwrap(),
            r#"{"ipv6": false, "x": true}"#
        );
    }

    #[test]
    fn test_normalize_literal_leaves_strings_alone() {
        // Words inside string literals must not be rewritten
        let normalized = normalize_literal(r#"{'comment': 'None shall pass'}"#).unwrap();
        assert_eq!(normalized, r#"{"comment": "None shall pass"}"#);

        let normalized = normalize_literal(r#"{"comment": "True story"}"#).unwrap();
        assert_eq!(normalized, r#"{"comment": "True story"}"#);
    }

    #[test]
    fn test_normalize_literal_escaped_quotes() {
        let normalized = normalize_literal(r"{'a': 'it\'s'}").unwrap();
        assert_eq!(normalized, r#"{"a": "it's"}"#);

        let normalized = normalize_literal(r#"{'a': 'say "hi"'}"#).unwrap();
        assert_eq!(normalized, r#"{"a": "say \"hi\""}"#);
    }

    #[test]
    fn test_normalize_literal_unterminated() {
        assert!(normalize_literal("{'a': 'oops}").is_err());
        assert!(normalize_literal(r#"{"a": "oops}"#).is_err());
    }

    #[test]
    fn test_parse_expr_literal() {
        let expr = parse_expr_literal(
            "[{'match': {'op': '==', 'left': {'payload': {'protocol': 'tcp', 'field': 'dport'}}, 'right': 8428}}, {'accept': None}]",
        )
        .unwrap();

        assert_eq!(expr.len(), 2);
        assert_eq!(expr[0]["match"]["op"], "==");
        assert_eq!(expr[1]["accept"], json!(null));
    }

    #[test]
    fn test_parse_expr_literal_rejects_non_list() {
        assert!(parse_expr_literal("{'match': {}}").is_err());
        assert!(parse_expr_literal("[{'match': ").is_err());
    }
}
