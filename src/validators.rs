//! Input validation and sanitization functions for nftprobe
//!
//! This module provides centralized validation for all caller inputs before
//! they reach the engine. Rule strings and object names are fed to `nft`
//! over a script stream, so anything that could smuggle extra commands into
//! that stream (control characters, newlines, semicolons) is rejected here.

/// Maximum accepted rule string length in bytes
///
/// Far beyond any realistic simple filter rule; bounds memory passed to the
/// engine process.
pub const MAX_RULE_LEN: usize = 4096;

/// Maximum accepted nftables object name length
pub const MAX_NAME_LEN: usize = 256;

/// Validates an nftables set name.
///
/// Names must start with a letter or underscore and continue with ASCII
/// alphanumerics, `_`, `-` or `.`. This is stricter than the engine's own
/// grammar but guarantees a name can never carry set-literal decoration
/// (braces, commas, `@`) into a command.
///
/// # Errors
///
/// Returns `Err` with a human-readable reason on violation.
pub fn validate_set_name(name: &str) -> Result<(), String> {
    validate_object_name(name, "set name")
}

/// Validates an nftables table name (same grammar as set names).
///
/// # Errors
///
/// Returns `Err` with a human-readable reason on violation.
pub fn validate_table_name(name: &str) -> Result<(), String> {
    validate_object_name(name, "table name")
}

fn validate_object_name(name: &str, what: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{what} cannot be empty"));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(format!("{what} too long (max {MAX_NAME_LEN} bytes)"));
    }

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(format!("{what} cannot be empty"));
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(format!("{what} must start with a letter or underscore"));
    }

    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) {
        return Err(format!("{what} contains invalid characters"));
    }

    Ok(())
}

/// Validates a rule string before it is submitted to the engine.
///
/// The rule is passed verbatim into an nft script stream where a newline or
/// semicolon would terminate the command and start another one. Syntax
/// checking is the engine's job; this only rejects what could break the
/// framing.
///
/// # Errors
///
/// Returns `Err` if the rule is empty, oversized, or contains control
/// characters or command separators.
pub fn validate_rule_text(rule: &str) -> Result<(), String> {
    if rule.trim().is_empty() {
        return Err("rule cannot be empty".to_string());
    }

    if rule.len() > MAX_RULE_LEN {
        return Err(format!("rule too long (max {MAX_RULE_LEN} bytes)"));
    }

    if rule.chars().any(char::is_control) {
        return Err("rule contains control characters".to_string());
    }

    if rule.contains(';') {
        return Err("rule contains a command separator".to_string());
    }

    Ok(())
}

/// Checks whether a summary address field looks like an address the engine
/// will accept.
///
/// Accepts bare addresses, CIDR networks, address ranges (`a-b`), comma
/// lists of those, and `@set` references. Informational only: the engine
/// remains the authority, this just powers early warnings.
pub fn check_address_field(value: &str) -> bool {
    value.split(',').map(str::trim).all(|part| {
        if let Some(name) = part.strip_prefix('@') {
            return validate_set_name(name).is_ok();
        }
        if let Some((lo, hi)) = part.split_once('-') {
            return is_plain_address(lo) && is_plain_address(hi);
        }
        is_plain_address(part) || part.parse::<ipnetwork::IpNetwork>().is_ok()
    })
}

fn is_plain_address(value: &str) -> bool {
    value.parse::<std::net::IpAddr>().is_ok()
}

/// Checks if an IP network is in a reserved range and returns an
/// informational note.
///
/// This never blocks anything; it helps callers understand when a probe
/// targets private or special ranges.
pub fn check_reserved_network(network: ipnetwork::IpNetwork) -> Option<String> {
    use std::net::IpAddr;

    match network.ip() {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();

            // RFC 1918 private ranges
            if octets[0] == 10
                || (octets[0] == 172 && (16..=31).contains(&octets[1]))
                || (octets[0] == 192 && octets[1] == 168)
            {
                return Some("Private range (RFC 1918)".to_string());
            }

            // Loopback
            if octets[0] == 127 {
                return Some("Loopback range (127.x)".to_string());
            }

            // Link-local
            if octets[0] == 169 && octets[1] == 254 {
                return Some("Link-local range (169.254.x.x)".to_string());
            }

            None
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() {
                return Some("IPv6 loopback (::1)".to_string());
            }

            if ipv6.segments()[0] & 0xffc0 == 0xfe80 {
                return Some("IPv6 link-local (fe80::/10)".to_string());
            }

            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_set_name_valid() {
        assert!(validate_set_name("mysource").is_ok());
        assert!(validate_set_name("_internal").is_ok());
        assert!(validate_set_name("lan-hosts.v4").is_ok());
        assert!(validate_set_name("s2").is_ok());
    }

    #[test]
    fn test_validate_set_name_invalid() {
        assert!(validate_set_name("").is_err());
        assert!(validate_set_name("2fast").is_err());
        assert!(validate_set_name("-dash").is_err());
        assert!(validate_set_name("my set").is_err());
        assert!(validate_set_name("my{set}").is_err());
        assert!(validate_set_name("a,b").is_err());
        assert!(validate_set_name("@ref").is_err());
    }

    #[test]
    fn test_validate_set_name_too_long() {
        let name = format!("a{}", "b".repeat(MAX_NAME_LEN));
        assert!(validate_set_name(&name).is_err());
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("validator").is_ok());
        assert!(validate_table_name("my table").is_err());
    }

    #[test]
    fn test_validate_rule_text_valid() {
        assert!(validate_rule_text("tcp dport 8428 ip saddr 10.28.1.97 accept").is_ok());
        assert!(validate_rule_text("ip saddr @mysource drop").is_ok());
        assert!(validate_rule_text("tcp dport { 80, 443 } accept comment \"web\"").is_ok());
    }

    #[test]
    fn test_validate_rule_text_rejects_framing_breaks() {
        assert!(validate_rule_text("accept\nflush ruleset").is_err());
        assert!(validate_rule_text("accept; flush ruleset").is_err());
        assert!(validate_rule_text("accept\tdrop").is_err());
        assert!(validate_rule_text("").is_err());
        assert!(validate_rule_text("   ").is_err());
    }

    #[test]
    fn test_validate_rule_text_too_long() {
        let rule = format!("tcp dport {} accept", "1".repeat(MAX_RULE_LEN));
        assert!(validate_rule_text(&rule).is_err());
    }

    #[test]
    fn test_check_address_field() {
        assert!(check_address_field("10.28.1.97"));
        assert!(check_address_field("1.2.3.0/24"));
        assert!(check_address_field("2001:db8::/32"));
        assert!(check_address_field("10.0.0.1-10.0.0.9"));
        assert!(check_address_field("1.2.3.0/24, 10.0.0.1"));
        assert!(check_address_field("@mysource"));

        assert!(!check_address_field("not-an-address"));
        assert!(!check_address_field("@my set"));
        assert!(!check_address_field("1.2.3.4, nope"));
    }

    #[test]
    fn test_check_reserved_network_private() {
        let network = "10.0.0.0/8".parse().unwrap();
        assert!(check_reserved_network(network).unwrap().contains("RFC 1918"));

        let network = "192.168.1.0/24".parse().unwrap();
        assert!(check_reserved_network(network).unwrap().contains("RFC 1918"));
    }

    #[test]
    fn test_check_reserved_network_loopback() {
        let network = "127.0.0.1/8".parse().unwrap();
        assert!(check_reserved_network(network).unwrap().contains("Loopback"));

        let network = "::1/128".parse().unwrap();
        assert!(check_reserved_network(network).unwrap().contains("loopback"));
    }

    #[test]
    fn test_check_reserved_network_public() {
        let network = "8.8.8.8/32".parse().unwrap();
        assert!(check_reserved_network(network).is_none());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_valid_names_never_contain_decoration(name in "[a-zA-Z_][a-zA-Z0-9_.-]{0,30}") {
            prop_assert!(validate_set_name(&name).is_ok());
            prop_assert!(!name.contains('{') && !name.contains('}'), "name must not contain braces");
        }

        #[test]
        fn test_names_with_invalid_chars_rejected(
            prefix in "[a-zA-Z_][a-zA-Z0-9_.-]{0,10}",
            bad in "[^a-zA-Z0-9_.-]"
        ) {
            let name = format!("{prefix}{bad}");
            prop_assert!(validate_set_name(&name).is_err());
        }

        #[test]
        fn test_rules_with_control_chars_rejected(
            prefix in "[a-z ]{1,20}",
            ctrl in prop::char::range('\u{0}', '\u{1f}')
        ) {
            let rule = format!("{prefix}{ctrl}accept");
            prop_assert!(validate_rule_text(&rule).is_err());
        }
    }
}
