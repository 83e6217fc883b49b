//! Flat dictionary representation of a decoded rule
//!
//! A [`RuleSummary`] is the canonical interchange format between callers and
//! the decode/encode pipeline: a flat set of optional fields describing the
//! match conditions and action of a simple filter rule. It serializes to the
//! JSON object callers exchange with other tooling.
//!
//! # Example
//!
//! ```
//! use nftprobe::core::summary::{RuleAction, RuleSummary, Transport};
//!
//! let summary = RuleSummary {
//!     ipv6: Some(false),
//!     daddr: Some("1.2.3.0/24".to_string()),
//!     protocol: Some(Transport::Tcp),
//!     dport: Some("123, 8428-8429".to_string()),
//!     action: Some(RuleAction::Accept),
//!     ..RuleSummary::default()
//! };
//! assert_eq!(summary.protocol.unwrap().as_str(), "tcp");
//! ```

use serde::{Deserialize, Serialize};

/// Transport protocol recognized in decoded match expressions
///
/// Only the protocols the decoder understands structurally. `Copy` trait
/// allows efficient passing by value for this small enum.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Internet Control Message Protocol
    #[strum(serialize = "icmp")]
    Icmp,
    /// Transmission Control Protocol
    #[strum(serialize = "tcp")]
    Tcp,
    /// User Datagram Protocol
    #[strum(serialize = "udp")]
    Udp,
}

impl Transport {
    /// Returns lowercase protocol name as static string
    pub const fn as_str(self) -> &'static str {
        match self {
            Transport::Icmp => "icmp",
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
        }
    }

    /// Maps an IP protocol number to a recognized transport.
    ///
    /// The engine renders protocols numerically (numeric-proto output mode),
    /// so decoded values arrive as `1`, `6` or `17`.
    pub const fn from_proto_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Transport::Icmp),
            6 => Some(Transport::Tcp),
            17 => Some(Transport::Udp),
            _ => None,
        }
    }

    /// True for transports that carry port fields
    pub const fn has_ports(self) -> bool {
        matches!(self, Transport::Tcp | Transport::Udp)
    }
}

/// Terminal action of a rule (accept, drop, or reject)
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Accept the packet (allow it through)
    #[strum(serialize = "accept")]
    Accept,
    /// Drop the packet silently (no response sent)
    #[strum(serialize = "drop")]
    Drop,
    /// Reject the packet and send an ICMP unreachable response
    #[strum(serialize = "reject")]
    Reject,
}

impl RuleAction {
    /// Returns lowercase action name as static string
    pub const fn as_str(self) -> &'static str {
        match self {
            RuleAction::Accept => "accept",
            RuleAction::Drop => "drop",
            RuleAction::Reject => "reject",
        }
    }
}

/// Flat dictionary representation of a decoded rule
///
/// All fields are optional; absence means the rule had no clause for that
/// field. `ipv6` is tri-state: `None` until an address-family-revealing
/// clause (address match or protocol-number match) is observed. Port fields
/// are only meaningful together with a `protocol` of `tcp`/`udp` - the
/// engine rejects port clauses on other transports before a summary is
/// ever produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSummary {
    /// Address family, once observed (`None` = not revealed by any clause)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<bool>,

    /// Destination address, network or range (e.g. `"1.2.3.0/24"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daddr: Option<String>,

    /// Source address, network or range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saddr: Option<String>,

    /// Matched transport protocol
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Transport>,

    /// Destination port, range or comma list (e.g. `"123, 8428-8429"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dport: Option<String>,

    /// Source port, range or comma list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,

    /// Terminal action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleAction>,
}

impl RuleSummary {
    /// True when no clause was decoded at all
    pub fn is_empty(&self) -> bool {
        self == &RuleSummary::default()
    }

    /// Parses a summary from an interchange literal.
    ///
    /// Accepts strict JSON as well as the relaxed single-quoted form other
    /// tooling emits (see [`crate::core::expr::normalize_literal`]).
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::error::Error::Literal`] when the literal is
    /// malformed or does not describe a summary object.
    pub fn from_literal(literal: &str) -> crate::core::error::Result<Self> {
        let normalized = crate::core::expr::normalize_literal(literal)?;
        serde_json::from_str(&normalized)
            .map_err(|e| crate::core::error::Error::Literal(e.to_string()))
    }
}
