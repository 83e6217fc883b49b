//! Named set inventory and reconciliation
//!
//! Rules reference address sets as `@name`; the engine rejects a rule whose
//! referenced sets are absent or carry the wrong element type. This module
//! scans a table listing into a set inventory, computes the minimal
//! add/delete plan against a target name list, and applies it as one batch
//! with deletes ordered before adds (a re-typed set must be deleted before
//! it can be re-added).
//!
//! Reconciliation is not transactional across the listing-then-batch
//! window: a concurrent actor changing sets in between can make the batch
//! fail. That failure is surfaced to the caller; there is no retry here.

use crate::core::error::{Error, Result};
use crate::core::session::NftSession;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Element type of a named set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetElemType {
    /// IPv4 address elements
    #[serde(rename = "ipv4_addr")]
    Ipv4Addr,
    /// IPv6 address elements
    #[serde(rename = "ipv6_addr")]
    Ipv6Addr,
    /// Any other engine type (ports, concatenations, ...); never created by
    /// the reconciler but kept visible so foreign sets count as wrong-typed
    /// rather than vanishing from the inventory
    #[serde(untagged)]
    Other(Value),
}

impl SetElemType {
    /// The element type used for address sets of the given family
    pub fn address(ipv6: bool) -> Self {
        if ipv6 {
            SetElemType::Ipv6Addr
        } else {
            SetElemType::Ipv4Addr
        }
    }
}

/// A named set as listed by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDefinition {
    pub family: String,
    pub table: String,
    pub name: String,
    #[serde(rename = "type")]
    pub elem_type: SetElemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<u64>,
}

/// The add/delete operations needed to reconcile the inventory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetPlan {
    /// Sets to delete, strictly limited to observed current members
    pub deletes: Vec<String>,
    /// Sets to (re-)create with the target element type
    pub adds: Vec<String>,
}

impl SetPlan {
    /// True when the inventory already matches the targets
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.adds.is_empty()
    }
}

/// Scans a table listing for set definitions.
///
/// Pure function over the listing structure; entries the model cannot
/// represent are skipped with a warning rather than failing the scan.
pub fn collect_sets(table_listing: &Value) -> BTreeMap<String, SetDefinition> {
    let mut sets = BTreeMap::new();

    let Some(items) = table_listing.get("nftables").and_then(Value::as_array) else {
        return sets;
    };

    for item in items {
        if let Some(raw) = item.get("set") {
            match serde_json::from_value::<SetDefinition>(raw.clone()) {
                Ok(def) => {
                    sets.insert(def.name.clone(), def);
                }
                Err(e) => warn!("skipping unparseable set definition: {e}"),
            }
        }
    }

    sets
}

/// Computes the minimal plan turning `current` into exactly `targets`.
///
/// A target missing from the inventory is added; a target present with the
/// wrong element type is deleted then re-added. With `delete_surplus`, every
/// observed set not in `targets` is deleted. Deletes are only ever planned
/// for names present in `current` - deleting an absent set is itself an
/// engine failure.
pub fn plan_set_changes(
    current: &BTreeMap<String, SetDefinition>,
    targets: &BTreeSet<String>,
    elem_type: &SetElemType,
    delete_surplus: bool,
) -> SetPlan {
    let mut plan = SetPlan::default();

    for name in targets {
        match current.get(name) {
            Some(def) if def.elem_type == *elem_type => {}
            Some(_) => {
                plan.deletes.push(name.clone());
                plan.adds.push(name.clone());
            }
            None => plan.adds.push(name.clone()),
        }
    }

    if delete_surplus {
        for name in current.keys() {
            if !targets.contains(name) {
                plan.deletes.push(name.clone());
            }
        }
    }

    plan
}

/// Builds the command batch realizing a plan, deletes before adds.
fn build_set_batch(table: &str, plan: &SetPlan, elem_type: &SetElemType) -> Value {
    let mut commands = Vec::with_capacity(plan.deletes.len() + plan.adds.len());

    for name in &plan.deletes {
        commands.push(json!({ "delete": { "set": {
            "family": "inet",
            "table": table,
            "name": name,
        }}}));
    }
    for name in &plan.adds {
        commands.push(json!({ "add": { "set": {
            "family": "inet",
            "table": table,
            "name": name,
            "type": elem_type,
        }}}));
    }

    json!({ "nftables": commands })
}

/// Makes exactly the named sets exist with the element type for the family.
///
/// Fetches a fresh inventory, computes the plan and submits it as one batch
/// when non-empty. Returns the applied plan; an empty plan means the
/// inventory already matched and nothing was submitted.
///
/// # Errors
///
/// Returns `Err` when a target name is invalid, the inventory listing
/// fails, or the engine rejects the batch (e.g. a concurrent actor removed
/// a set between listing and submission).
pub async fn ensure_sets(
    session: &mut NftSession,
    targets: &BTreeSet<String>,
    ipv6: bool,
    delete_surplus: bool,
) -> Result<SetPlan> {
    for name in targets {
        crate::validators::validate_set_name(name).map_err(|message| Error::Validation {
            field: format!("set {name}"),
            message,
        })?;
    }

    let listing = session.get_ruleset_json().await?;
    let current = collect_sets(&listing);
    let elem_type = SetElemType::address(ipv6);
    let plan = plan_set_changes(&current, targets, &elem_type, delete_surplus);

    if plan.is_empty() {
        debug!(table = %session.table(), "set inventory already matches targets");
        return Ok(plan);
    }

    info!(
        table = %session.table(),
        deletes = plan.deletes.len(),
        adds = plan.adds.len(),
        "synchronizing sets"
    );

    let batch = build_set_batch(session.table(), &plan, &elem_type);
    let result = session.run_cmd_json(&batch).await;

    if session.audit_enabled() {
        crate::audit::log_set_sync(
            session.table(),
            &plan.deletes,
            &plan.adds,
            result.is_ok(),
            result.as_ref().err().map(ToString::to_string),
        )
        .await;
    }

    result?;
    Ok(plan)
}
