use crate::constants::SAMPLE_DATA;
use crate::error::Result;
use crate::pipeline::processing::enrich::synthesize_star_rating;
use crate::types::{PlanSource, RawPlanData, SourceKind};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tracing::{debug, instrument};

const ORGANIZATIONS: &[&str] = &[
    "Humana",
    "UnitedHealthcare",
    "Aetna",
    "Kaiser Permanente",
    "Blue Cross Blue Shield",
    "Cigna",
    "Centene",
    "Molina Healthcare",
    "WellCare",
    "CareSource",
];

const MEDICARE_TIERS: &[&str] = &["Advantage HMO", "Advantage PPO", "Choice Plus", "Gold Plus", "Dual Complete"];
const MEDICAID_TIERS: &[&str] = &["Community Plan", "Family Care", "Health Partners", "Managed Care"];

const STATES: &[(&str, &[&str])] = &[
    ("CA", &["Los Angeles", "San Diego", "Alameda"]),
    ("TX", &["Harris", "Travis", "Dallas"]),
    ("FL", &["Miami-Dade", "Orange", "Duval"]),
    ("NY", &["Kings", "Erie", "Monroe"]),
    ("IL", &["Cook", "DuPage"]),
    ("PA", &["Philadelphia", "Allegheny"]),
    ("OH", &["Franklin", "Cuyahoga"]),
    ("GA", &["Fulton", "DeKalb"]),
    ("AZ", &["Maricopa", "Pima"]),
    ("WA", &["King", "Spokane"]),
];

/// Generated plan records for demos and as the fallback when every other
/// source comes back empty
pub struct SampleDataSource {
    plan_count: usize,
    seed: Option<u64>,
}

impl SampleDataSource {
    pub fn new(plan_count: usize, seed: Option<u64>) -> Self {
        Self { plan_count, seed }
    }

    /// Generate `plan_count` raw records from `rng`
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<RawPlanData> {
        (0..self.plan_count).map(|i| sample_record(i, rng)).collect()
    }
}

fn sample_record<R: Rng + ?Sized>(index: usize, rng: &mut R) -> RawPlanData {
    let medicare = rng.gen_bool(0.6);
    let organization = ORGANIZATIONS.choose(rng).copied().unwrap_or(ORGANIZATIONS[0]);
    let (state, counties) = STATES.choose(rng).copied().unwrap_or(STATES[0]);
    let county = counties.choose(rng).copied();
    let tier = if medicare {
        MEDICARE_TIERS.choose(rng)
    } else {
        MEDICAID_TIERS.choose(rng)
    }
    .copied()
    .unwrap_or("Plan");

    let contract_id = if medicare {
        format!("H{:04}-{:03}", rng.gen_range(1000..10_000), rng.gen_range(1..100))
    } else {
        format!("MC-{}-{:03}", state, rng.gen_range(1..1000))
    };
    let slug: String = organization
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    json!({
        "id": format!("sample-{}", index + 1),
        "name": format!("{} {}", organization, tier),
        "type": if medicare { "medicare" } else { "medicaid" },
        "state": state,
        "county": county,
        "organization": organization,
        "star_rating": synthesize_star_rating(rng),
        "members": rng.gen_range(1_000..250_000u64),
        "contract_id": contract_id,
        "zip_code": format!("{:05}", rng.gen_range(10_000..99_999)),
        "phone": format!("1-800-555-{:04}", rng.gen_range(0..10_000)),
        "website": format!("https://www.{}.example.com", slug),
    })
}

#[async_trait::async_trait]
impl PlanSource for SampleDataSource {
    fn source_name(&self) -> &str {
        SAMPLE_DATA
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Sample
    }

    #[instrument(skip(self), fields(count = self.plan_count))]
    async fn fetch_plans(&self) -> Result<Vec<RawPlanData>> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let records = self.generate(&mut rng);
        debug!("Generated {} sample plans", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlanType;
    use crate::pipeline::processing::normalize::PlanNormalizer;
    use crate::types::SourceBatch;

    #[tokio::test]
    async fn test_seeded_generation_is_reproducible() {
        let a = SampleDataSource::new(15, Some(99)).fetch_plans().await.unwrap();
        let b = SampleDataSource::new(15, Some(99)).fetch_plans().await.unwrap();
        assert_eq!(a.len(), 15);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_sample_records_normalize_cleanly() {
        let records = SampleDataSource::new(40, Some(3)).fetch_plans().await.unwrap();
        let batch = SourceBatch::new(SAMPLE_DATA, SourceKind::Sample, records);
        let mut rng = StdRng::seed_from_u64(3);
        let normalized = PlanNormalizer::new().normalize_batch(&batch, &mut rng);

        assert!(normalized.skipped.is_empty());
        assert_eq!(normalized.plans.len(), 40);
        for plan in &normalized.plans {
            assert!(!plan.star_rating_synthesized);
            assert!((1.0..=5.0).contains(&plan.star_rating));
            assert_ne!(plan.region.as_str(), "Other");
            assert_eq!(plan.source, SAMPLE_DATA);
            if plan.plan_type == PlanType::Medicare {
                assert!(plan.contract_id.starts_with('H'));
            }
        }
    }
}
