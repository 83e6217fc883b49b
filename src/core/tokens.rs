//! Rule-string tokenization and set-reference extraction
//!
//! Before a rule can be probed, every `@name` set reference in it must exist
//! in the session table with the right element type. This module lexes the
//! rule string into a typed token stream and collects the referenced set
//! names plus the target address family.
//!
//! The lexer understands inline set-literal braces (`{@a, @b}`) as separate
//! tokens, so brace and comma decoration can never leak into a set name -
//! the engine does not accept set references inside set literals, but the
//! extractor must not be confused by the syntax either. Quoted strings
//! (rule comments) are opaque: references or family keywords inside them
//! are never extracted.

use logos::Logos;
use std::collections::BTreeSet;

/// A single token of a rule string
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum RuleToken {
    #[token("{")]
    BraceOpen,

    #[token("}")]
    BraceClose,

    #[token(",")]
    Comma,

    /// IPv6 family keyword; its presence switches set element types
    #[token("ip6")]
    Ip6,

    /// Quoted string (comment text), contents carried without the quotes
    #[regex(r#""[^"]*""#, |lex| lex.slice().trim_matches('"').to_owned())]
    Quoted(String),

    /// Set reference, carried without the leading `@`
    #[regex(r#"@[^\s{},@"]+"#, |lex| lex.slice()[1..].to_owned())]
    SetRef(String),

    /// Any other bare word (keywords, addresses, ports, ranges)
    #[regex(r#"[^\s{},@"]+"#, |lex| lex.slice().to_owned())]
    Word(String),
}

/// Set references found in a rule string, with the target address family
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetRefs {
    /// Referenced set names, deduplicated, without syntactic decoration
    pub names: BTreeSet<String>,
    /// True when the rule contains the `ip6` family keyword
    pub ipv6: bool,
}

impl SetRefs {
    /// True when the rule references no sets (no reconciliation needed)
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Extracts the set references and address family from a rule string.
///
/// Characters the lexer cannot place (a lone `@`, stray punctuation) are
/// skipped rather than treated as an error; the engine is the authority on
/// whether the rule as a whole is valid.
pub fn extract_set_refs(rule: &str) -> SetRefs {
    let mut refs = SetRefs::default();

    for token in RuleToken::lexer(rule).flatten() {
        match token {
            RuleToken::Ip6 => refs.ipv6 = true,
            RuleToken::SetRef(name) => {
                refs.names.insert(name);
            }
            _ => {}
        }
    }

    refs
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_names_never_contain_decoration(rule in "[ -~]{0,80}") {
            let refs = extract_set_refs(&rule);
            for name in &refs.names {
                prop_assert!(!name.contains('{'), "name must not contain brace");
                prop_assert!(!name.contains('}'), "name must not contain brace");
                prop_assert!(!name.contains(','));
                prop_assert!(!name.contains('@'));
                prop_assert!(!name.contains(' '));
                prop_assert!(!name.is_empty());
            }
        }

        #[test]
        fn test_braced_reference_always_stripped(name in "[a-z][a-z0-9_]{0,15}") {
            let rule = format!("ip saddr {{@{name}}} accept");
            let refs = extract_set_refs(&rule);
            prop_assert!(refs.names.contains(&name));
        }
    }
}
