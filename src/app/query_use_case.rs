use serde::Serialize;
use tracing::debug;

use crate::domain::Plan;
use crate::pipeline::{compute_stats, PlanFilter, PlanStats};

/// Filtered view of a plan list with statistics over the matches
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub plans: Vec<Plan>,
    pub stats: PlanStats,
    /// Size of the unfiltered list
    pub total_available: usize,
}

/// Answers predicate queries against one aggregated plan list
pub struct QueryUseCase<'a> {
    plans: &'a [Plan],
}

impl<'a> QueryUseCase<'a> {
    pub fn new(plans: &'a [Plan]) -> Self {
        Self { plans }
    }

    pub fn query(&self, filter: &PlanFilter) -> QueryResult {
        let plans = filter.apply(self.plans);
        debug!("Query matched {} of {} plans", plans.len(), self.plans.len());
        let stats = compute_stats(&plans);
        QueryResult {
            plans,
            stats,
            total_available: self.plans.len(),
        }
    }
}
