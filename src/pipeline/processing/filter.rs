use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::{Plan, PlanType, Region, Severity};

/// Which failure profile a plan must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailureFilter {
    /// No constraint
    #[default]
    All,
    /// Plan has no failures
    None,
    /// Plan has at least one failure
    Any,
    /// Plan has at least one failure of this severity
    Severity(Severity),
}

impl FailureFilter {
    pub fn matches(&self, plan: &Plan) -> bool {
        match self {
            FailureFilter::All => true,
            FailureFilter::None => plan.cms_failures.is_empty(),
            FailureFilter::Any => !plan.cms_failures.is_empty(),
            FailureFilter::Severity(wanted) => {
                plan.cms_failures.iter().any(|f| f.severity() == *wanted)
            }
        }
    }
}

impl FromStr for FailureFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(FailureFilter::All),
            "none" => Ok(FailureFilter::None),
            "any" => Ok(FailureFilter::Any),
            "critical" => Ok(FailureFilter::Severity(Severity::Critical)),
            "high" => Ok(FailureFilter::Severity(Severity::High)),
            "medium" => Ok(FailureFilter::Severity(Severity::Medium)),
            "low" => Ok(FailureFilter::Severity(Severity::Low)),
            other => Err(format!("unknown failure severity filter: {other}")),
        }
    }
}

/// Conjunctive predicate set; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanFilter {
    pub plan_type: Option<PlanType>,
    pub min_star_rating: Option<f64>,
    pub state: Option<String>,
    pub region: Option<Region>,
    pub failure: FailureFilter,
    pub query: Option<String>,
}

/// Treat "", "all" and whitespace as "no filter"
fn selection(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
        .map(str::to_string)
}

/// Accepts the two program names only
fn parse_plan_type(value: &str) -> Result<PlanType, String> {
    match value.to_lowercase().as_str() {
        "medicare" => Ok(PlanType::Medicare),
        "medicaid" => Ok(PlanType::Medicaid),
        other => Err(format!("unknown plan type filter: {other} (expected medicare, medicaid or all)")),
    }
}

impl PlanFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from loosely typed inputs such as CLI flags.
    pub fn from_inputs(
        plan_type: Option<&str>,
        min_star_rating: Option<f64>,
        state: Option<&str>,
        region: Option<&str>,
        failure: Option<&str>,
        query: Option<&str>,
    ) -> Result<Self, String> {
        Ok(Self {
            plan_type: selection(plan_type).as_deref().map(parse_plan_type).transpose()?,
            min_star_rating: min_star_rating.filter(|r| r.is_finite() && *r > 0.0),
            state: selection(state),
            region: selection(region).as_deref().map(Region::from_str).transpose()?,
            failure: failure.map(FailureFilter::from_str).transpose()?.unwrap_or_default(),
            query: query
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_lowercase),
        })
    }

    pub fn with_type(mut self, plan_type: PlanType) -> Self {
        self.plan_type = Some(plan_type);
        self
    }

    pub fn with_min_star_rating(mut self, rating: f64) -> Self {
        self.min_star_rating = Some(rating);
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_failure(mut self, failure: FailureFilter) -> Self {
        self.failure = failure;
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into().to_lowercase());
        self
    }

    fn matches_query(&self, plan: &Plan) -> bool {
        let Some(query) = self.query.as_deref() else {
            return true;
        };
        let query = query.to_lowercase();
        [
            plan.name.as_str(),
            plan.state.as_str(),
            plan.region.as_str(),
            plan.plan_type.as_str(),
            plan.organization.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&query))
    }

    /// Whether a single plan satisfies every predicate
    pub fn matches(&self, plan: &Plan) -> bool {
        self.plan_type.map_or(true, |t| plan.plan_type == t)
            && self.min_star_rating.map_or(true, |r| plan.star_rating >= r)
            && self.state.as_deref().map_or(true, |s| plan.state == s)
            && self.region.map_or(true, |r| plan.region == r)
            && self.failure.matches(plan)
            && self.matches_query(plan)
    }

    /// Matching plans in their original relative order; `plans` is untouched.
    pub fn apply(&self, plans: &[Plan]) -> Vec<Plan> {
        plans.iter().filter(|p| self.matches(p)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CmsFailure;
    use crate::pipeline::processing::normalize::PlanNormalizer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn sample_plans() -> Vec<Plan> {
        let mut rng = StdRng::seed_from_u64(21);
        let normalizer = PlanNormalizer::new();
        let raw = [
            json!({"name": "Sunshine Advantage", "type": "medicare", "state": "FL", "star_rating": 4.5, "organization": "Humana"}),
            json!({"name": "Lone Star Care", "type": "medicaid", "state": "TX", "star_rating": 3.0, "organization": "Centene"}),
            json!({"name": "Golden Gate Plus", "type": "medicare", "state": "CA", "star_rating": 3.5, "organization": "Kaiser"}),
            json!({"name": "Empire Basic", "type": "medicare", "state": "NY", "star_rating": 4.0, "organization": "Fidelis"}),
            json!({"name": "Bayou Health", "type": "medicaid", "state": "LA", "star_rating": 4.5, "organization": "Aetna"}),
        ];
        raw.iter()
            .enumerate()
            .map(|(i, r)| normalizer.normalize(r, "test", i, &mut rng))
            .collect()
    }

    fn failure(target: f64, actual: f64) -> CmsFailure {
        CmsFailure {
            criterion: "Customer Service".to_string(),
            target,
            actual,
            impact: Severity::classify(target, actual),
            description: String::new(),
            recommendations: Vec::new(),
        }
    }

    fn names(plans: &[Plan]) -> Vec<&str> {
        plans.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let plans = sample_plans();
        assert_eq!(PlanFilter::new().apply(&plans), plans);
        let from_sentinels =
            PlanFilter::from_inputs(Some("all"), None, Some(""), Some("ALL"), Some("all"), Some("  ")).unwrap();
        assert_eq!(from_sentinels, PlanFilter::new());
    }

    #[test]
    fn test_predicates_compose_as_and() {
        let plans = sample_plans();
        let by_type = PlanFilter::new().with_type(PlanType::Medicare).apply(&plans);
        let by_rating = PlanFilter::new().with_min_star_rating(4.0).apply(&plans);
        let both = PlanFilter::new()
            .with_type(PlanType::Medicare)
            .with_min_star_rating(4.0)
            .apply(&plans);

        let intersection: Vec<Plan> = by_type.iter().filter(|p| by_rating.contains(p)).cloned().collect();
        assert_eq!(both, intersection);
        assert_eq!(names(&both), vec!["Sunshine Advantage", "Empire Basic"]);
    }

    #[test]
    fn test_state_and_region() {
        let plans = sample_plans();
        assert_eq!(names(&PlanFilter::new().with_state("TX").apply(&plans)), vec!["Lone Star Care"]);
        assert_eq!(
            names(&PlanFilter::new().with_region(Region::Southeast).apply(&plans)),
            vec!["Sunshine Advantage", "Bayou Health"]
        );
    }

    #[test]
    fn test_free_text_searches_several_fields() {
        let plans = sample_plans();
        assert_eq!(names(&PlanFilter::new().with_query("GOLDEN").apply(&plans)), vec!["Golden Gate Plus"]);
        assert_eq!(names(&PlanFilter::new().with_query("kaiser").apply(&plans)), vec!["Golden Gate Plus"]);
        assert_eq!(PlanFilter::new().with_query("medicaid").apply(&plans).len(), 2);
        assert_eq!(PlanFilter::new().with_query("northeast").apply(&plans).len(), 1);
        assert!(PlanFilter::new().with_query("zzz").apply(&plans).is_empty());
    }

    #[test]
    fn test_failure_filters() {
        let mut plans = sample_plans();
        plans[0].cms_failures = vec![failure(4.0, 3.0)];
        plans[1].cms_failures = vec![failure(3.8, 3.3), failure(3.0, 2.9)];
        plans[2].cms_failures = Vec::new();
        plans[3].cms_failures = Vec::new();
        plans[4].cms_failures = vec![failure(4.0, 3.7)];

        let run = |f: &str| names(&PlanFilter::new().with_failure(f.parse().unwrap()).apply(&plans))
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        assert_eq!(run("none"), vec!["Golden Gate Plus", "Empire Basic"]);
        assert_eq!(run("any"), vec!["Sunshine Advantage", "Lone Star Care", "Bayou Health"]);
        assert_eq!(run("critical"), vec!["Sunshine Advantage"]);
        assert_eq!(run("high"), vec!["Lone Star Care"]);
        assert_eq!(run("medium"), vec!["Bayou Health"]);
        assert_eq!(run("low"), vec!["Lone Star Care"]);
        assert_eq!(run("all").len(), 5);
    }

    #[test]
    fn test_filtering_is_non_destructive() {
        let plans = sample_plans();
        let before = plans.clone();
        let _ = PlanFilter::new().with_state("CA").apply(&plans);
        let _ = PlanFilter::new().with_type(PlanType::Medicaid).apply(&plans);
        assert_eq!(plans, before);
        assert_eq!(PlanFilter::new().with_state("CA").apply(&plans).len(), 1);
    }

    #[test]
    fn test_unknown_failure_filter_is_rejected() {
        assert!(PlanFilter::from_inputs(None, None, None, None, Some("severe"), None).is_err());
    }

    #[test]
    fn test_region_input_ignores_case() {
        let plans = sample_plans();
        for input in ["southeast", "SOUTHEAST", " Southeast ", "south"] {
            let filter = PlanFilter::from_inputs(None, None, None, Some(input), None, None).unwrap();
            assert_eq!(filter.region, Some(Region::Southeast));
            assert_eq!(names(&filter.apply(&plans)), vec!["Sunshine Advantage", "Bayou Health"]);
        }
        assert!(PlanFilter::from_inputs(None, None, None, Some("Pacific"), None, None).is_err());
    }

    #[test]
    fn test_plan_type_input_is_strict() {
        let medicaid = PlanFilter::from_inputs(Some("MEDICAID"), None, None, None, None, None).unwrap();
        assert_eq!(medicaid.plan_type, Some(PlanType::Medicaid));
        let medicare = PlanFilter::from_inputs(Some("medicare"), None, None, None, None, None).unwrap();
        assert_eq!(medicare.plan_type, Some(PlanType::Medicare));
        assert!(PlanFilter::from_inputs(Some("foo"), None, None, None, None, None).is_err());
        assert!(PlanFilter::from_inputs(Some("medicaid managed care"), None, None, None, None, None).is_err());
    }
}
