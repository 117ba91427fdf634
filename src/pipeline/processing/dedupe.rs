use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::constants::{NOT_AVAILABLE, UNKNOWN_ORGANIZATION, UNKNOWN_PLAN, UNKNOWN_STATE};
use crate::domain::Plan;
use crate::metrics::{emit_counter, MetricName};

/// Plans that share an identity key, by position in the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub key: String,
    /// Position of the kept (first) occurrence
    pub original_index: usize,
    /// Positions of every later occurrence that was removed
    pub duplicate_indices: Vec<usize>,
}

impl DuplicateGroup {
    /// (original index, duplicate index) pairs
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.duplicate_indices
            .iter()
            .map(move |dup| (self.original_index, *dup))
    }
}

#[derive(Debug, Clone)]
pub struct DedupeResult {
    pub unique_plans: Vec<Plan>,
    pub removed_count: usize,
    /// Groups in order of their first occurrence
    pub groups: Vec<DuplicateGroup>,
}

/// Defaults written by the normalizer carry no identity
fn is_placeholder(value: &str) -> bool {
    value.is_empty()
        || value == UNKNOWN_STATE
        || value == UNKNOWN_ORGANIZATION
        || value == UNKNOWN_PLAN
        || value == NOT_AVAILABLE
}

/// Identity key: name, type, state, organization, contract id.
///
/// Name and organization are trimmed and lowercased. Empty or placeholder
/// fields are left out, so two plans that both lack a contract id still
/// collide on the rest. Parts are labelled so an omitted field cannot make
/// one field's value line up with another's.
pub fn dedupe_key(plan: &Plan) -> String {
    let name = plan.name.trim();
    let organization = plan.organization.trim();
    let state = plan.state.trim();
    let contract = plan.contract_id.trim();

    let mut parts = Vec::with_capacity(5);
    if !is_placeholder(name) {
        parts.push(format!("name:{}", name.to_lowercase()));
    }
    parts.push(format!("type:{}", plan.plan_type));
    if !is_placeholder(state) {
        parts.push(format!("state:{state}"));
    }
    if !is_placeholder(organization) {
        parts.push(format!("org:{}", organization.to_lowercase()));
    }
    if !is_placeholder(contract) {
        parts.push(format!("contract:{contract}"));
    }
    parts.join("|")
}

/// Remove repeated plans, keeping the first occurrence of each key in order.
pub fn dedupe(plans: &[Plan]) -> DedupeResult {
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut group_slots: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut unique_plans = Vec::with_capacity(plans.len());

    for (index, plan) in plans.iter().enumerate() {
        let key = dedupe_key(plan);
        match first_seen.get(&key) {
            None => {
                first_seen.insert(key, index);
                unique_plans.push(plan.clone());
            }
            Some(&original_index) => {
                debug!("Duplicate plan '{}' at {} (first seen at {})", plan.name, index, original_index);
                let slot = *group_slots.entry(key.clone()).or_insert_with(|| {
                    groups.push(DuplicateGroup {
                        key: key.clone(),
                        original_index,
                        duplicate_indices: Vec::new(),
                    });
                    groups.len() - 1
                });
                groups[slot].duplicate_indices.push(index);
            }
        }
    }

    let removed_count = plans.len() - unique_plans.len();
    if removed_count > 0 {
        info!(
            "Removed {} duplicate plans across {} groups",
            removed_count,
            groups.len()
        );
        emit_counter(MetricName::DedupeDuplicatesRemoved, removed_count as u64);
    }
    groups.sort_by_key(|g| g.original_index);

    DedupeResult {
        unique_plans,
        removed_count,
        groups,
    }
}
