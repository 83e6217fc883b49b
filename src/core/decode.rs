//! Decoding of structured match expressions into rule summaries
//!
//! Walks the ordered expression term list echoed by the engine and fills a
//! [`RuleSummary`] from the recognized clauses. Unsupported shapes become a
//! structured [`DecodeError`] instead of an overloaded free-text slot: the
//! walk still visits every term so partial state matches what was decodable,
//! and the *last* failing term determines the reported error.

use crate::core::expr::{MatchExpr, MatchValue, PayloadField};
use crate::core::summary::{RuleAction, RuleSummary, Transport};
use serde_json::Value;
use thiserror::Error;

/// A clause the decoder could not understand
///
/// Each variant names the failing clause and carries enough context to
/// reconstruct why it was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Term with a top-level key other than an action or `match`
    #[error("unsupported key in expression term: {key}")]
    UnsupportedTerm { key: String },

    /// Match with an operator other than `==`
    #[error("unsupported operator {op:?} in match expression")]
    UnsupportedOperator { op: String },

    /// Match whose left side is not a payload field reference
    #[error("no payload reference on the left side of the match expression")]
    MissingPayload,

    /// Payload (protocol, field) pair outside the supported selectors
    #[error("unsupported selector {protocol} {field} in match expression")]
    UnsupportedSelector { protocol: String, field: String },

    /// Right-hand operand the value grammar cannot render
    #[error("unsupported right-hand operand in {field} expression")]
    UnsupportedValue { field: String },

    /// Protocol-number match with a value outside the recognized transports
    #[error("unsupported protocol number {value} in match expression")]
    UnsupportedProtocolNumber { value: String },

    /// Term that is not even object-shaped
    #[error("malformed expression term: {0}")]
    Malformed(String),
}

/// Decodes an expression term list into a [`RuleSummary`].
///
/// Every term is visited even after a failure; the last failure wins.
/// Callers must treat `Err` as decode failure for the whole rule.
///
/// # Errors
///
/// Returns the [`DecodeError`] for the last term the walk could not decode.
pub fn decode_expr(expr: &[Value]) -> Result<RuleSummary, DecodeError> {
    let mut summary = RuleSummary::default();
    let mut failure = None;

    for term in expr {
        if let Err(e) = decode_term(term, &mut summary) {
            failure = Some(e);
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

/// Decodes an expression literal (strict JSON or relaxed quoting) into a
/// [`RuleSummary`].
///
/// # Errors
///
/// Returns [`crate::core::error::Error::Literal`] for a malformed literal
/// and [`crate::core::error::Error::Decode`] for unsupported expression
/// shapes.
pub fn decode_expr_literal(literal: &str) -> crate::core::error::Result<RuleSummary> {
    let expr = crate::core::expr::parse_expr_literal(literal)?;
    Ok(decode_expr(&expr)?)
}

fn decode_term(term: &Value, summary: &mut RuleSummary) -> Result<(), DecodeError> {
    let Some(object) = term.as_object() else {
        return Err(DecodeError::Malformed(term.to_string()));
    };

    if object.contains_key("accept") {
        summary.action = Some(RuleAction::Accept);
        return Ok(());
    }
    if object.contains_key("drop") {
        summary.action = Some(RuleAction::Drop);
        return Ok(());
    }
    if object.contains_key("reject") {
        summary.action = Some(RuleAction::Reject);
        return Ok(());
    }

    let Some(raw_match) = object.get("match") else {
        let key = object
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| "<empty>".to_string());
        return Err(DecodeError::UnsupportedTerm { key });
    };

    let matched: MatchExpr = serde_json::from_value(raw_match.clone())
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    if matched.op != "==" {
        return Err(DecodeError::UnsupportedOperator { op: matched.op });
    }

    let rendered = serde_json::from_value::<MatchValue>(matched.right.clone())
        .ok()
        .and_then(|value| value.render());
    let Some(rendered) = rendered else {
        return Err(DecodeError::UnsupportedValue {
            field: "match".to_string(),
        });
    };

    let payload: PayloadField = match matched.left.get("payload") {
        Some(payload) => serde_json::from_value(payload.clone())
            .map_err(|_| DecodeError::MissingPayload)?,
        None => return Err(DecodeError::MissingPayload),
    };

    match (payload.protocol.as_str(), payload.field.as_str()) {
        ("ip" | "ip6", "saddr") => {
            summary.ipv6 = Some(payload.protocol == "ip6");
            summary.saddr = Some(rendered);
        }
        ("ip" | "ip6", "daddr") => {
            summary.ipv6 = Some(payload.protocol == "ip6");
            summary.daddr = Some(rendered);
        }
        ("ip", "protocol") | ("ip6", "nexthdr") => {
            // Family is revealed even when the number itself is unsupported
            summary.ipv6 = Some(payload.protocol == "ip6");
            let transport = rendered
                .parse::<u8>()
                .ok()
                .and_then(Transport::from_proto_number);
            match transport {
                Some(transport) => summary.protocol = Some(transport),
                None => {
                    return Err(DecodeError::UnsupportedProtocolNumber { value: rendered });
                }
            }
        }
        ("tcp", "sport" | "dport") | ("udp", "sport" | "dport") => {
            summary.protocol = Some(if payload.protocol == "tcp" {
                Transport::Tcp
            } else {
                Transport::Udp
            });
            if payload.field == "sport" {
                summary.sport = Some(rendered);
            } else {
                summary.dport = Some(rendered);
            }
        }
        _ => {
            return Err(DecodeError::UnsupportedSelector {
                protocol: payload.protocol,
                field: payload.field,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload_match(protocol: &str, field: &str, right: Value) -> Value {
        json!({
            "match": {
                "op": "==",
                "left": { "payload": { "protocol": protocol, "field": field } },
                "right": right
            }
        })
    }

    #[test]
    fn test_decode_port_range() {
        let expr = vec![
            payload_match("tcp", "dport", json!({"range": [8428, 8429]})),
            json!({"accept": null}),
        ];

        let summary = decode_expr(&expr).unwrap();
        assert_eq!(summary.dport.as_deref(), Some("8428-8429"));
        assert_eq!(summary.protocol, Some(Transport::Tcp));
        assert_eq!(summary.action, Some(RuleAction::Accept));
        assert_eq!(summary.ipv6, None);
    }

    #[test]
    fn test_decode_numeric_protocol() {
        let expr = vec![payload_match("ip", "protocol", json!(6)), json!({"drop": null})];
        let summary = decode_expr(&expr).unwrap();
        assert_eq!(summary.protocol, Some(Transport::Tcp));
        assert_eq!(summary.ipv6, Some(false));
        assert_eq!(summary.action, Some(RuleAction::Drop));

        let expr = vec![payload_match("ip6", "nexthdr", json!(17))];
        let summary = decode_expr(&expr).unwrap();
        assert_eq!(summary.protocol, Some(Transport::Udp));
        assert_eq!(summary.ipv6, Some(true));
    }

    #[test]
    fn test_decode_unknown_protocol_number() {
        let expr = vec![payload_match("ip", "protocol", json!(99))];
        let err = decode_expr(&expr).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnsupportedProtocolNumber {
                value: "99".to_string()
            }
        );
    }

    #[test]
    fn test_decode_full_rule() {
        // ip daddr 1.2.3.0/24 tcp dport { 8428-8429, 123 } ip saddr 10.28.1.0/24
        // tcp sport 65000 accept
        let expr = vec![
            payload_match(
                "ip",
                "daddr",
                json!({"prefix": {"addr": "1.2.3.0", "len": 24}}),
            ),
            payload_match(
                "tcp",
                "dport",
                json!({"set": [123, {"range": [8428, 8429]}]}),
            ),
            payload_match(
                "ip",
                "saddr",
                json!({"prefix": {"addr": "10.28.1.0", "len": 24}}),
            ),
            payload_match("tcp", "sport", json!(65000)),
            json!({"accept": null}),
        ];

        let summary = decode_expr(&expr).unwrap();
        assert_eq!(summary.ipv6, Some(false));
        assert_eq!(summary.daddr.as_deref(), Some("1.2.3.0/24"));
        assert_eq!(summary.dport.as_deref(), Some("123, 8428-8429"));
        assert_eq!(summary.saddr.as_deref(), Some("10.28.1.0/24"));
        assert_eq!(summary.sport.as_deref(), Some("65000"));
        assert_eq!(summary.protocol, Some(Transport::Tcp));
        assert_eq!(summary.action, Some(RuleAction::Accept));
    }

    #[test]
    fn test_decode_bare_action() {
        let summary = decode_expr(&[json!({"reject": null})]).unwrap();
        assert_eq!(summary.action, Some(RuleAction::Reject));
        assert!(summary.ipv6.is_none());
    }

    #[test]
    fn test_decode_unsupported_operator() {
        let expr = vec![json!({
            "match": {
                "op": "!=",
                "left": { "payload": { "protocol": "tcp", "field": "dport" } },
                "right": 22
            }
        })];
        assert_eq!(
            decode_expr(&expr).unwrap_err(),
            DecodeError::UnsupportedOperator {
                op: "!=".to_string()
            }
        );
    }

    #[test]
    fn test_decode_meta_left_is_missing_payload() {
        let expr = vec![json!({
            "match": {
                "op": "==",
                "left": { "meta": { "key": "iifname" } },
                "right": "lo"
            }
        })];
        assert_eq!(decode_expr(&expr).unwrap_err(), DecodeError::MissingPayload);
    }

    #[test]
    fn test_decode_unknown_term() {
        let err = decode_expr(&[json!({"counter": null})]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnsupportedTerm {
                key: "counter".to_string()
            }
        );
    }

    #[test]
    fn test_decode_unsupported_selector() {
        let expr = vec![payload_match("icmp", "type", json!(8))];
        assert_eq!(
            decode_expr(&expr).unwrap_err(),
            DecodeError::UnsupportedSelector {
                protocol: "icmp".to_string(),
                field: "type".to_string()
            }
        );
    }

    #[test]
    fn test_last_error_wins() {
        let expr = vec![
            json!({"counter": null}),
            payload_match("ip", "protocol", json!(99)),
        ];
        assert_eq!(
            decode_expr(&expr).unwrap_err(),
            DecodeError::UnsupportedProtocolNumber {
                value: "99".to_string()
            }
        );
    }

    #[test]
    fn test_decode_continues_past_failures() {
        // The failing middle term must not stop the action term from being seen
        let expr = vec![
            payload_match("ip", "saddr", json!("10.0.0.1")),
            json!({"counter": null}),
            json!({"accept": null}),
        ];
        assert!(decode_expr(&expr).is_err());
    }

    #[test]
    fn test_decode_expr_literal_relaxed_quoting() {
        let summary = decode_expr_literal(
            "[{'match': {'op': '==', 'left': {'payload': {'protocol': 'ip', 'field': 'saddr'}}, 'right': '10.28.1.97'}}, {'accept': None}]",
        )
        .unwrap();
        assert_eq!(summary.saddr.as_deref(), Some("10.28.1.97"));
        assert_eq!(summary.ipv6, Some(false));
        assert_eq!(summary.action, Some(RuleAction::Accept));
    }
}
