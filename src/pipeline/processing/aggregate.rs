use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, instrument};

use crate::domain::{round2, Plan, PlanType, Severity};
use crate::metrics::{emit_counter, emit_gauge, emit_histogram, MetricName};
use crate::pipeline::processing::normalize::PlanNormalizer;
use crate::types::SourceBatch;

const TOP_FAILING_CRITERIA: usize = 5;

/// How often a criterion shows up in plans' failure lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionFailureCount {
    pub criterion: String,
    pub count: usize,
}

/// Failure analysis across a plan set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureSummary {
    pub plans_with_failures: usize,
    pub total_failures: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub top_criteria: Vec<CriterionFailureCount>,
}

/// Summary statistics over a plan set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStats {
    pub total_count: usize,
    pub count_by_type: BTreeMap<PlanType, usize>,
    pub count_by_region: BTreeMap<String, usize>,
    pub count_by_state: BTreeMap<String, usize>,
    pub distinct_states: usize,
    pub distinct_organizations: usize,
    pub total_members: u64,
    /// Mean rating of Medicare plans, two decimals; `None` when there are none
    pub average_star_rating: Option<f64>,
    pub sources: Vec<String>,
    pub failures: FailureSummary,
}

impl PlanStats {
    /// Average rating for display, `"N/A"` when no Medicare plan is rated
    pub fn average_star_rating_display(&self) -> String {
        self.average_star_rating
            .map(|avg| format!("{avg:.2}"))
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// Locale-style ordering: case-insensitive first, exact text as tie-break
pub fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Stable sort by state, then name
pub fn sort_plans(plans: &mut [Plan]) {
    plans.sort_by(|a, b| collate(&a.state, &b.state).then_with(|| collate(&a.name, &b.name)));
}

/// Statistics over `plans`. Never fails; an empty set yields zeros and "N/A".
pub fn compute_stats(plans: &[Plan]) -> PlanStats {
    let mut count_by_type: BTreeMap<PlanType, usize> =
        PlanType::all().into_iter().map(|t| (t, 0)).collect();
    let mut count_by_region: BTreeMap<String, usize> = BTreeMap::new();
    let mut count_by_state: BTreeMap<String, usize> = BTreeMap::new();
    let mut organizations: HashSet<String> = HashSet::new();
    let mut sources: Vec<String> = Vec::new();
    let mut total_members: u64 = 0;
    let mut rating_sum = 0.0;
    let mut rated_medicare = 0usize;

    let mut failures = FailureSummary::default();
    let mut criterion_counts: HashMap<&str, usize> = HashMap::new();

    for plan in plans {
        *count_by_type.entry(plan.plan_type).or_default() += 1;
        *count_by_region.entry(plan.region.to_string()).or_default() += 1;
        *count_by_state.entry(plan.state.clone()).or_default() += 1;
        organizations.insert(plan.organization.trim().to_lowercase());
        if !sources.contains(&plan.source) {
            sources.push(plan.source.clone());
        }
        total_members = total_members.saturating_add(plan.members);

        if plan.plan_type == PlanType::Medicare && plan.star_rating.is_finite() {
            rating_sum += plan.star_rating;
            rated_medicare += 1;
        }

        if plan.has_failures() {
            failures.plans_with_failures += 1;
        }
        for failure in &plan.cms_failures {
            failures.total_failures += 1;
            *failures.by_severity.entry(failure.severity()).or_default() += 1;
            *criterion_counts.entry(failure.criterion.as_str()).or_default() += 1;
        }
    }

    let mut top: Vec<CriterionFailureCount> = criterion_counts
        .into_iter()
        .map(|(criterion, count)| CriterionFailureCount {
            criterion: criterion.to_string(),
            count,
        })
        .collect();
    top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.criterion.cmp(&b.criterion)));
    top.truncate(TOP_FAILING_CRITERIA);
    failures.top_criteria = top;

    let average_star_rating =
        (rated_medicare > 0).then(|| round2(rating_sum / rated_medicare as f64));

    PlanStats {
        total_count: plans.len(),
        count_by_type,
        count_by_region,
        distinct_states: count_by_state.len(),
        count_by_state,
        distinct_organizations: organizations.len(),
        total_members,
        average_star_rating,
        sources,
        failures,
    }
}

/// Merged plan list and its statistics
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub plans: Vec<Plan>,
    pub stats: PlanStats,
    /// (source name, record index) of raw records skipped as unidentifiable
    pub skipped: Vec<(String, usize)>,
}

/// Give later plans that reuse an id a `~n` suffix so ids are unique per run
fn make_ids_unique(plans: &mut [Plan]) {
    // Reserve every incoming id first so a suffix never lands on an id
    // some later record already carries.
    let mut taken: HashSet<String> = plans.iter().map(|p| p.id.clone()).collect();
    let mut first_seen: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    for plan in plans.iter_mut() {
        if first_seen.insert(plan.id.clone()) {
            continue;
        }
        let n = next_suffix.entry(plan.id.clone()).or_insert(1);
        let mut candidate = format!("{}~{}", plan.id, n);
        while taken.contains(&candidate) {
            *n += 1;
            candidate = format!("{}~{}", plan.id, n);
        }
        *n += 1;
        taken.insert(candidate.clone());
        plan.id = candidate;
    }
}

/// Fold every source batch into one sorted, normalized plan list.
///
/// Batches are concatenated in the order given and normalized as they are
/// folded in; the combined list is stably sorted by (state, name).
#[instrument(skip_all, fields(batches = batches.len()))]
pub fn merge<R: Rng + ?Sized>(
    batches: &[SourceBatch],
    normalizer: &PlanNormalizer,
    rng: &mut R,
) -> MergeResult {
    let t_merge = std::time::Instant::now();
    let mut plans = Vec::new();
    let mut skipped = Vec::new();

    for batch in batches {
        let normalized = normalizer.normalize_batch(batch, rng);
        skipped.extend(
            normalized
                .skipped
                .into_iter()
                .map(|i| (batch.source_name.clone(), i)),
        );
        plans.extend(normalized.plans);
    }

    make_ids_unique(&mut plans);
    sort_plans(&mut plans);
    let stats = compute_stats(&plans);

    info!(
        "Merged {} plans from {} sources ({} records skipped)",
        plans.len(),
        batches.len(),
        skipped.len()
    );
    emit_counter(MetricName::MergeRunsTotal, 1);
    emit_gauge(MetricName::MergePlansTotal, plans.len() as f64);
    emit_histogram(MetricName::MergeDuration, t_merge.elapsed().as_secs_f64());

    MergeResult {
        plans,
        stats,
        skipped,
    }
}
