//! Transient rule probing against the scratch chain
//!
//! A probe adds the candidate rule to the scratch chain, captures the
//! engine's structured echo of what was installed, and immediately flushes
//! the chain again so no probed rule ever persists. The echoed expression
//! is the engine's own representation, not a re-derivation - it is what the
//! decoder consumes.
//!
//! The add-then-flush sequence is the one protocol invariant this layer
//! must not break: if the flush after a successful add fails, the scratch
//! chain may still hold the rule and the session is in an unknown state.
//! That failure is [`Error::Inconsistent`] and is never retried.

use crate::core::error::{Error, Result};
use crate::core::session::{NftSession, SCRATCH_CHAIN};
use crate::core::sets::ensure_sets;
use crate::core::tokens::extract_set_refs;
use serde_json::Value;
use tracing::{error, info};

/// Outcome of probing a candidate rule
///
/// Engine rejection of the rule is an expected outcome and therefore data,
/// not an error; `Err` is reserved for transport and protocol failures.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleCheck {
    /// The rule is valid; `expr` is the engine's structured echo of its
    /// match conditions and action
    Valid { expr: Vec<Value> },
    /// The engine rejected the rule
    Invalid { reason: String },
}

impl RuleCheck {
    /// True when the probe succeeded
    pub const fn is_valid(&self) -> bool {
        matches!(self, RuleCheck::Valid { .. })
    }
}

/// Probes a rule against the scratch chain.
///
/// On success the chain is flushed before returning, so the probe leaves no
/// persistent state behind (the scratch chain holds no base policy, so the
/// transient rule never affects traffic).
///
/// # Errors
///
/// - [`Error::Validation`] when the rule string could break script framing
/// - [`Error::Inconsistent`] when the mandatory cleanup flush fails
/// - [`Error::Nftables`] and friends for transport-level failures
pub async fn check_rule(session: &mut NftSession, rule: &str) -> Result<RuleCheck> {
    crate::validators::validate_rule_text(rule).map_err(|message| Error::Validation {
        field: "rule".to_string(),
        message,
    })?;

    let probe_id = uuid::Uuid::new_v4();
    info!(probe_id = %probe_id, rule, "probing rule");

    let add = format!("add rule inet {} {} {}", session.table(), SCRATCH_CHAIN, rule);
    let echo = match session.run_cmd(&add).await {
        Ok(echo) => echo,
        Err(Error::Nftables { message, .. }) => {
            info!(probe_id = %probe_id, reason = %message, "rule rejected");
            if session.audit_enabled() {
                crate::audit::log_rule_probe(session.table(), probe_id, rule, false, None).await;
            }
            return Ok(RuleCheck::Invalid { reason: message });
        }
        Err(e) => return Err(e),
    };

    let flush = format!("flush chain inet {} {}", session.table(), SCRATCH_CHAIN);
    if let Err(e) = session.run_cmd(&flush).await {
        // The probed rule may or may not still be installed
        error!(probe_id = %probe_id, "cleanup flush failed: {e}");
        if session.audit_enabled() {
            crate::audit::log_rule_probe(
                session.table(),
                probe_id,
                rule,
                true,
                Some(format!("cleanup flush failed: {e}")),
            )
            .await;
        }
        return Err(Error::Inconsistent(format!(
            "cleanup flush after successful add failed: {e}"
        )));
    }

    if session.audit_enabled() {
        crate::audit::log_rule_probe(session.table(), probe_id, rule, true, None).await;
    }

    let expr = extract_echo_expr(&echo)?;
    Ok(RuleCheck::Valid { expr })
}

/// Probes a rule after reconciling the sets it references.
///
/// Set references are extracted from the rule string and made to exist with
/// the element type matching the rule's address family before the probe;
/// the engine would otherwise reject the rule outright. Referenced sets are
/// reconciled with surplus deletion so stale sets from earlier probes do
/// not accumulate in the scratch table.
///
/// # Errors
///
/// Same as [`check_rule`], plus reconciliation failures.
pub async fn check_rule_with_sets(session: &mut NftSession, rule: &str) -> Result<RuleCheck> {
    let refs = extract_set_refs(rule);
    if !refs.is_empty() {
        ensure_sets(session, &refs.names, refs.ipv6, true).await?;
    }
    check_rule(session, rule).await
}

/// Pulls the expression list out of the engine's add-with-echo output.
fn extract_echo_expr(echo: &Value) -> Result<Vec<Value>> {
    echo.get("nftables")
        .and_then(Value::as_array)
        .and_then(|items| {
            items.iter().find_map(|item| {
                item.get("add")?
                    .get("rule")?
                    .get("expr")?
                    .as_array()
                    .cloned()
            })
        })
        .ok_or_else(|| {
            Error::Internal("echo output is missing the added rule expression".to_string())
        })
}
