//! Rendering of rule summaries back into rule-string syntax
//!
//! Inverse of [`crate::core::decode`], restricted to the fields present in
//! the summary. Clauses come out in a fixed order: destination address, bare
//! protocol, destination port, source address, source port, action. Comma
//! lists expand into brace-delimited set literals.
//!
//! The renderer is best-effort: a bare protocol clause is only emitted when
//! the family is known and no port clause already implies the transport, and
//! port clauses are only emitted for port-bearing transports (tcp/udp). A
//! summary with inconsistently omitted fields may therefore not re-decode to
//! an identical summary; round-trip equivalence is established by re-probing
//! the encoded string, not by string comparison.

use crate::core::summary::RuleSummary;

/// Renders a summary as a rule string.
pub fn encode_summary(summary: &RuleSummary) -> String {
    let family = if summary.ipv6 == Some(true) { "ip6" } else { "ip" };
    let mut clauses: Vec<String> = Vec::with_capacity(6);

    if let Some(daddr) = &summary.daddr {
        clauses.push(format!("{family} daddr {}", expand_list(daddr)));
    }

    if let Some(protocol) = summary.protocol {
        // Port clauses already name the transport; the bare form is only
        // needed when no port field will be rendered and the family is known
        if summary.ipv6.is_some() && summary.dport.is_none() && summary.sport.is_none() {
            let selector = if summary.ipv6 == Some(true) {
                "nexthdr"
            } else {
                "protocol"
            };
            clauses.push(format!("{family} {selector} {}", protocol.as_str()));
        }
    }

    if let (Some(dport), Some(protocol)) = (&summary.dport, summary.protocol)
        && protocol.has_ports()
    {
        clauses.push(format!("{} dport {}", protocol.as_str(), expand_list(dport)));
    }

    if let Some(saddr) = &summary.saddr {
        clauses.push(format!("{family} saddr {}", expand_list(saddr)));
    }

    if let (Some(sport), Some(protocol)) = (&summary.sport, summary.protocol)
        && protocol.has_ports()
    {
        clauses.push(format!("{} sport {}", protocol.as_str(), expand_list(sport)));
    }

    if let Some(action) = summary.action {
        clauses.push(action.as_str().to_string());
    }

    clauses.join(" ")
}

/// Expands a comma-separated value into set-literal syntax.
///
/// A multi-valued field becomes `{a, b}` with normalized spacing; a single
/// value is emitted bare.
pub fn expand_list(value: &str) -> String {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() > 1 {
        format!("{{{}}}", parts.join(", "))
    } else {
        parts[0].to_string()
    }
}
