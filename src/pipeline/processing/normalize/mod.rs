//! Field normalization.
//!
//! Raw records arrive in many shapes. Each canonical field is resolved through
//! an ordered chain of candidate keys: keys specific to the record's
//! [`SourceKind`] first, then the structural alternates every source may use,
//! then a literal default. The chains live in declarative tables so adding a
//! source means adding rows, not code.

pub mod region;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::constants::{NOT_AVAILABLE, UNKNOWN_ORGANIZATION, UNKNOWN_PLAN, UNKNOWN_STATE};
use crate::domain::{round1, CmsFailure, NcqaRating, Plan, PlanType};
use crate::error::AggregatorError;
use crate::metrics::{emit_counter_for_source, MetricName};
use crate::pipeline::processing::enrich::{derive_quality_metrics, synthesize_star_rating, QualityMetrics};
use crate::types::{RawPlanData, SourceBatch, SourceKind};

pub use region::region_for_state;

/// Canonical fields resolved from raw records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Name,
    PlanType,
    State,
    Organization,
    StarRating,
    Members,
    ContractId,
    County,
    ZipCode,
    Phone,
    Website,
    LastUpdated,
}

/// Structural alternates tried for every source, in priority order
const GENERIC_KEYS: &[(Field, &[&str])] = &[
    (Field::Id, &["id", "plan_id", "planId", "plan_identifier"]),
    (Field::Name, &["plan_name", "planName", "name", "title"]),
    (Field::PlanType, &["plan_type", "planType", "type", "program", "category"]),
    (
        Field::State,
        &["state", "state_code", "stateCode", "state_abbr", "address.state", "location.state"],
    ),
    (
        Field::Organization,
        &[
            "organization",
            "organization_name",
            "org_name",
            "parent_organization",
            "insurer",
            "carrier",
            "company",
        ],
    ),
    (
        Field::StarRating,
        &["star_rating", "starRating", "overall_star_rating", "overall_rating", "rating", "stars"],
    ),
    (
        Field::Members,
        &["members", "enrollment", "total_enrollment", "enrollees", "member_count"],
    ),
    (Field::ContractId, &["contract_id", "contractId", "contract_number", "contract"]),
    (Field::County, &["county", "county_name", "address.county", "location.county"]),
    (
        Field::ZipCode,
        &["zip_code", "zipCode", "zip", "postal_code", "address.zip", "location.zip"],
    ),
    (
        Field::Phone,
        &["phone", "phone_number", "customer_service_phone", "contact.phone"],
    ),
    (Field::Website, &["website", "url", "web_site", "plan_url", "contact.website"]),
    (
        Field::LastUpdated,
        &["last_updated", "lastUpdated", "updated_at", "as_of_date", "date"],
    ),
];

/// Source-specific keys, tried before the generic chain
const SOURCE_KEYS: &[(SourceKind, Field, &[&str])] = &[
    (SourceKind::MedicareApi, Field::Id, &["contract_plan_id", "Contract Plan ID"]),
    (SourceKind::MedicareApi, Field::Name, &["Plan Name", "plan_marketing_name"]),
    (SourceKind::MedicareApi, Field::PlanType, &["Plan Type"]),
    (SourceKind::MedicareApi, Field::State, &["State", "state_abbreviation"]),
    (
        SourceKind::MedicareApi,
        Field::Organization,
        &["Organization Marketing Name", "org_marketing_name", "Parent Organization"],
    ),
    (SourceKind::MedicareApi, Field::StarRating, &["Overall Rating", "overall_star_rating"]),
    (SourceKind::MedicareApi, Field::Members, &["Enrollment", "enrollment_count"]),
    (SourceKind::MedicareApi, Field::ContractId, &["Contract ID", "contract_number"]),
    (SourceKind::MedicareApi, Field::County, &["County"]),
    (SourceKind::MedicaidApi, Field::Name, &["Plan Name", "mco_plan_name"]),
    (
        SourceKind::MedicaidApi,
        Field::Organization,
        &["mco_name", "managed_care_entity", "Managed Care Entity"],
    ),
    (SourceKind::MedicaidApi, Field::State, &["State", "state_name"]),
    (SourceKind::MedicaidApi, Field::Members, &["Enrollment", "total_medicaid_enrollment"]),
    (SourceKind::Cached, Field::Name, &["name"]),
    (SourceKind::Cached, Field::PlanType, &["type"]),
    (SourceKind::Cached, Field::StarRating, &["starRating"]),
    (SourceKind::Cached, Field::ContractId, &["contractId"]),
    (SourceKind::Cached, Field::ZipCode, &["zipCode"]),
    (SourceKind::Cached, Field::LastUpdated, &["lastUpdated"]),
];

static NUMERIC_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,\s_$]").expect("numeric noise pattern is valid"));
static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)").expect("leading number pattern is valid"));

/// Ordered candidate keys for a field from a given kind of source
pub fn candidate_keys(kind: SourceKind, field: Field) -> impl Iterator<Item = &'static str> {
    let specific = SOURCE_KEYS
        .iter()
        .filter(move |(k, f, _)| *k == kind && *f == field)
        .flat_map(|(_, _, keys)| keys.iter().copied());
    let generic = GENERIC_KEYS
        .iter()
        .filter(move |(f, _)| *f == field)
        .flat_map(|(_, keys)| keys.iter().copied());
    specific.chain(generic)
}

/// Follow a dotted key path into nested objects
fn lookup<'a>(raw: &'a Value, key: &str) -> Option<&'a Value> {
    if let Some(direct) = raw.get(key) {
        return Some(direct);
    }
    if !key.contains('.') {
        return None;
    }
    key.split('.').try_fold(raw, |value, part| value.get(part))
}

/// Scalar as trimmed, non-empty text
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First candidate key holding a usable value
fn resolve<'a>(raw: &'a Value, kind: SourceKind, field: Field) -> Option<&'a Value> {
    candidate_keys(kind, field).find_map(|key| {
        lookup(raw, key).filter(|v| !v.is_null() && text_of(v).is_some())
    })
}

fn resolve_text(raw: &Value, kind: SourceKind, field: Field) -> Option<String> {
    resolve(raw, kind, field).and_then(text_of)
}

/// Enrollment count: numbers or numeric strings ("12,345"); anything else is 0.
pub fn coerce_members(value: Option<&Value>) -> u64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => NUMERIC_NOISE.replace_all(s, "").parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() && n >= 0.0 => n.round() as u64,
        _ => 0,
    }
}

/// Supplied star rating, if it parses to a positive number.
/// Accepts "4.5", "4.5 stars", "4.5 out of 5"; clamps to [1, 5], one decimal.
pub fn parse_star_rating(value: Option<&Value>) -> Option<f64> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => LEADING_NUMBER
            .captures(s)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok()),
        _ => None,
    }?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return None;
    }
    Some(round1(parsed.clamp(1.0, 5.0)))
}

/// Calendar date from "YYYY-MM-DD", RFC 3339 timestamps or "MM/DD/YYYY"
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
        .or_else(|| NaiveDate::parse_from_str(text, "%m/%d/%Y").ok())
        .or_else(|| text.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

/// Previously derived metrics carried on the record, if they are self-consistent
fn supplied_metrics(raw: &Value) -> Option<QualityMetrics> {
    let criteria: BTreeMap<String, f64> = ["cmsCriteria", "cms_criteria"]
        .iter()
        .find_map(|k| raw.get(*k))
        .and_then(|v| serde_json::from_value(v.clone()).ok())?;
    let failures: Vec<CmsFailure> = ["cmsFailures", "cms_failures"]
        .iter()
        .find_map(|k| raw.get(*k))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    let ncqa: NcqaRating = ["ncqaRating", "ncqa_rating"]
        .iter()
        .find_map(|k| raw.get(*k))
        .and_then(|v| serde_json::from_value(v.clone()).ok())?;

    let criteria_valid = !criteria.is_empty() && criteria.values().all(|s| (1.0..=5.0).contains(s));
    let failures_valid = failures
        .iter()
        .all(|f| criteria.contains_key(&f.criterion) && f.target >= f.actual);
    let ncqa_valid = (20..=100).contains(&ncqa.score);

    (criteria_valid && failures_valid && ncqa_valid).then_some(QualityMetrics {
        cms_criteria: criteria,
        cms_failures: failures,
        ncqa_rating: ncqa,
    })
}

/// Whether a raw value carries anything that identifies a plan
pub fn has_identity(raw: &Value, kind: SourceKind) -> bool {
    raw.is_object()
        && [Field::Id, Field::Name, Field::ContractId, Field::Organization]
            .iter()
            .any(|field| resolve_text(raw, kind, *field).is_some())
}

/// Plans normalized from one batch plus the positions that were skipped
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub plans: Vec<Plan>,
    pub skipped: Vec<usize>,
}

/// Maps raw records onto the canonical [`Plan`] shape
#[derive(Debug, Clone)]
pub struct PlanNormalizer {
    today: NaiveDate,
}

impl Default for PlanNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanNormalizer {
    pub fn new() -> Self {
        Self {
            today: Utc::now().date_naive(),
        }
    }

    /// Normalizer with a fixed "today", used for `lastUpdated` defaults and NCQA years
    pub fn with_date(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Normalize one record. The hint is both the provenance label and the
    /// shape selector. Never fails: unresolved fields take their defaults.
    pub fn normalize<R: Rng + ?Sized>(
        &self,
        raw: &RawPlanData,
        source_hint: &str,
        index: usize,
        rng: &mut R,
    ) -> Plan {
        self.normalize_record(raw, SourceKind::from_hint(source_hint), source_hint, index, rng)
    }

    pub fn normalize_record<R: Rng + ?Sized>(
        &self,
        raw: &RawPlanData,
        kind: SourceKind,
        source_name: &str,
        index: usize,
        rng: &mut R,
    ) -> Plan {
        let text_or = |field: Field, default: &str| {
            resolve_text(raw, kind, field).unwrap_or_else(|| default.to_string())
        };

        let id = resolve_text(raw, kind, Field::Id)
            .unwrap_or_else(|| format!("{source_name}_{index}"));
        let name = resolve_text(raw, kind, Field::Name).unwrap_or_else(|| match kind {
            SourceKind::Sample => format!("Plan {}", index + 1),
            _ => UNKNOWN_PLAN.to_string(),
        });
        let plan_type = match kind {
            SourceKind::MedicaidApi => PlanType::Medicaid,
            _ => PlanType::from_declared(&text_or(Field::PlanType, "")),
        };
        let state = text_or(Field::State, UNKNOWN_STATE);
        let region = region_for_state(&state);
        let organization = text_or(Field::Organization, UNKNOWN_ORGANIZATION);

        let (star_rating, star_rating_synthesized) =
            match parse_star_rating(resolve(raw, kind, Field::StarRating)) {
                Some(rating) => (rating, false),
                None => (synthesize_star_rating(rng), true),
            };
        if star_rating_synthesized {
            emit_counter_for_source(MetricName::NormalizeRatingsSynthesized, source_name, 1);
        }

        let members = coerce_members(resolve(raw, kind, Field::Members));
        let last_updated = resolve_text(raw, kind, Field::LastUpdated)
            .and_then(|d| parse_date(&d))
            .unwrap_or(self.today);

        let metrics = supplied_metrics(raw).unwrap_or_else(|| {
            derive_quality_metrics(star_rating, &organization, self.today.year(), rng)
        });

        Plan {
            id,
            name,
            plan_type,
            state,
            region,
            organization,
            star_rating,
            star_rating_synthesized,
            ncqa_rating: metrics.ncqa_rating,
            members,
            cms_criteria: metrics.cms_criteria,
            cms_failures: metrics.cms_failures,
            contract_id: text_or(Field::ContractId, NOT_AVAILABLE),
            county: text_or(Field::County, NOT_AVAILABLE),
            zip_code: text_or(Field::ZipCode, NOT_AVAILABLE),
            phone: text_or(Field::Phone, NOT_AVAILABLE),
            website: text_or(Field::Website, NOT_AVAILABLE),
            source: source_name.to_string(),
            last_updated,
        }
    }

    /// Normalize a whole batch, skipping records with no salvageable identity.
    pub fn normalize_batch<R: Rng + ?Sized>(&self, batch: &SourceBatch, rng: &mut R) -> NormalizedBatch {
        let mut out = NormalizedBatch::default();
        for (index, raw) in batch.records.iter().enumerate() {
            if !has_identity(raw, batch.kind) {
                let err = AggregatorError::MalformedRecord {
                    source_name: batch.source_name.clone(),
                    index,
                    reason: "no identifying fields".to_string(),
                };
                warn!(source = %batch.source_name, index, "Skipping record: {}", err);
                out.skipped.push(index);
                continue;
            }
            out.plans
                .push(self.normalize_record(raw, batch.kind, &batch.source_name, index, rng));
        }

        emit_counter_for_source(
            MetricName::NormalizeRecordsProcessed,
            &batch.source_name,
            out.plans.len() as u64,
        );
        if !out.skipped.is_empty() {
            emit_counter_for_source(
                MetricName::NormalizeRecordsSkipped,
                &batch.source_name,
                out.skipped.len() as u64,
            );
        }
        debug!(
            source = %batch.source_name,
            "Normalized {} records ({} skipped)",
            out.plans.len(),
            out.skipped.len()
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Region;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn normalizer() -> PlanNormalizer {
        PlanNormalizer::with_date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
    }

    #[test]
    fn test_normalize_generic_record() {
        let mut rng = StdRng::seed_from_u64(1);
        let raw = json!({
            "plan_name": "Golden Years Advantage",
            "plan_type": "Medicare Advantage HMO",
            "state": "CA",
            "organization": "Kaiser Permanente",
            "star_rating": "4.5",
            "members": "12,345",
            "contract_id": "H0524",
            "zip": 94612
        });

        let plan = normalizer().normalize(&raw, "partner_feed", 0, &mut rng);

        assert_eq!(plan.name, "Golden Years Advantage");
        assert_eq!(plan.plan_type, PlanType::Medicare);
        assert_eq!(plan.region, Region::West);
        assert_eq!(plan.star_rating, 4.5);
        assert!(!plan.star_rating_synthesized);
        assert_eq!(plan.members, 12_345);
        assert_eq!(plan.contract_id, "H0524");
        assert_eq!(plan.zip_code, "94612");
        assert_eq!(plan.phone, NOT_AVAILABLE);
        assert_eq!(plan.source, "partner_feed");
        assert_eq!(plan.id, "partner_feed_0");
        assert_eq!(plan.last_updated, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn test_fallback_chain_prefers_earlier_keys() {
        let mut rng = StdRng::seed_from_u64(2);
        let raw = json!({ "title": "Title Name", "name": "Name Name" });
        let plan = normalizer().normalize(&raw, "x", 0, &mut rng);
        assert_eq!(plan.name, "Name Name");

        let raw = json!({ "title": "Only Title", "name": "   " });
        let plan = normalizer().normalize(&raw, "x", 0, &mut rng);
        assert_eq!(plan.name, "Only Title");
    }

    #[test]
    fn test_source_specific_keys_win() {
        let mut rng = StdRng::seed_from_u64(3);
        let raw = json!({
            "Plan Name": "AARP Medicare Advantage",
            "name": "ignored",
            "Contract ID": "H0543",
            "Organization Marketing Name": "UnitedHealthcare",
            "Overall Rating": "4 out of 5 stars",
            "State": "Texas",
            "Enrollment": "250,000"
        });
        let plan = normalizer().normalize(&raw, "medicare_api", 3, &mut rng);
        assert_eq!(plan.name, "AARP Medicare Advantage");
        assert_eq!(plan.contract_id, "H0543");
        assert_eq!(plan.organization, "UnitedHealthcare");
        assert_eq!(plan.star_rating, 4.0);
        assert_eq!(plan.region, Region::Southwest);
        assert_eq!(plan.members, 250_000);
    }

    #[test]
    fn test_empty_record_takes_defaults() {
        let mut rng = StdRng::seed_from_u64(4);
        let plan = normalizer().normalize(&json!({}), "partner_feed", 7, &mut rng);
        assert_eq!(plan.id, "partner_feed_7");
        assert_eq!(plan.name, UNKNOWN_PLAN);
        assert_eq!(plan.plan_type, PlanType::Medicare);
        assert_eq!(plan.state, UNKNOWN_STATE);
        assert_eq!(plan.region, Region::Other);
        assert_eq!(plan.organization, UNKNOWN_ORGANIZATION);
        assert_eq!(plan.members, 0);
        assert!(plan.star_rating_synthesized);
        assert!((1.0..=5.0).contains(&plan.star_rating));
    }

    #[test]
    fn test_sample_source_names_plans_by_index() {
        let mut rng = StdRng::seed_from_u64(5);
        let plan = normalizer().normalize(&json!({}), "sample_data", 4, &mut rng);
        assert_eq!(plan.name, "Plan 5");
    }

    #[test]
    fn test_medicaid_detection() {
        let mut rng = StdRng::seed_from_u64(6);
        let raw = json!({ "name": "Healthy Kids", "type": "State MEDICAID program" });
        assert_eq!(normalizer().normalize(&raw, "x", 0, &mut rng).plan_type, PlanType::Medicaid);

        let raw = json!({ "name": "Community Care" });
        assert_eq!(
            normalizer().normalize(&raw, "medicaid_api", 0, &mut rng).plan_type,
            PlanType::Medicaid
        );
    }

    #[test]
    fn test_nested_keys() {
        let mut rng = StdRng::seed_from_u64(7);
        let raw = json!({ "name": "Nested", "address": { "state": "NY", "zip": "10001" } });
        let plan = normalizer().normalize(&raw, "x", 0, &mut rng);
        assert_eq!(plan.state, "NY");
        assert_eq!(plan.region, Region::Northeast);
        assert_eq!(plan.zip_code, "10001");
    }

    #[test]
    fn test_coerce_members() {
        assert_eq!(coerce_members(Some(&json!(1500))), 1500);
        assert_eq!(coerce_members(Some(&json!("1,500"))), 1500);
        assert_eq!(coerce_members(Some(&json!("lots"))), 0);
        assert_eq!(coerce_members(Some(&json!(-4))), 0);
        assert_eq!(coerce_members(Some(&json!("*"))), 0);
        assert_eq!(coerce_members(None), 0);
    }

    #[test]
    fn test_parse_star_rating() {
        assert_eq!(parse_star_rating(Some(&json!(3.46))), Some(3.5));
        assert_eq!(parse_star_rating(Some(&json!("4.5 stars"))), Some(4.5));
        assert_eq!(parse_star_rating(Some(&json!(7))), Some(5.0));
        assert_eq!(parse_star_rating(Some(&json!(0.4))), Some(1.0));
        assert_eq!(parse_star_rating(Some(&json!(0))), None);
        assert_eq!(parse_star_rating(Some(&json!("Not enough data"))), None);
        assert_eq!(parse_star_rating(None), None);
    }

    #[test]
    fn test_parse_dates() {
        let expected = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        assert_eq!(parse_date("2025-10-01"), Some(expected));
        assert_eq!(parse_date("2025-10-01T08:30:00Z"), Some(expected));
        assert_eq!(parse_date("10/01/2025"), Some(expected));
        assert_eq!(parse_date("last week"), None);
    }

    #[test]
    fn test_batch_skips_records_without_identity() {
        let mut rng = StdRng::seed_from_u64(8);
        let batch = SourceBatch::new(
            "partner_feed",
            SourceKind::Generic,
            vec![
                json!({ "name": "Keeps" }),
                json!("not an object"),
                json!({ "members": 10 }),
                json!({ "contract_id": "H9999" }),
            ],
        );
        let out = normalizer().normalize_batch(&batch, &mut rng);
        assert_eq!(out.plans.len(), 2);
        assert_eq!(out.skipped, vec![1, 2]);
        assert_eq!(out.plans[1].id, "partner_feed_3");
    }

    #[test]
    fn test_supplied_metrics_are_preserved() {
        let mut rng = StdRng::seed_from_u64(9);
        let first = normalizer().normalize(&json!({ "name": "Round Trip", "starRating": 2.0 }), "x", 0, &mut rng);
        let raw = serde_json::to_value(&first).unwrap();
        let second = normalizer().normalize(&raw, "cache", 0, &mut rng);
        assert_eq!(second.cms_criteria, first.cms_criteria);
        assert_eq!(second.cms_failures, first.cms_failures);
        assert_eq!(second.ncqa_rating, first.ncqa_rating);
        assert_eq!(second.star_rating, 2.0);
    }

    #[test]
    fn test_normalized_plans_hold_invariants() {
        let mut rng = StdRng::seed_from_u64(10);
        let shapes = [
            json!({ "name": "A", "rating": "junk", "state": "ZZ" }),
            json!({ "title": "B", "stars": 9.9, "type": "medicaid" }),
            json!({ "planName": "C", "starRating": -1 }),
        ];
        for (i, raw) in shapes.iter().enumerate() {
            let plan = normalizer().normalize(raw, "x", i, &mut rng);
            assert!(matches!(plan.plan_type, PlanType::Medicare | PlanType::Medicaid));
            assert!((1.0..=5.0).contains(&plan.star_rating));
            assert_eq!(plan.star_rating, round1(plan.star_rating));
            for failure in &plan.cms_failures {
                assert!(plan.cms_criteria.contains_key(&failure.criterion));
                assert!(failure.target >= failure.actual);
            }
        }
    }
}
