use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

use crate::constants::CMS_CRITERIA;
use crate::domain::{round1, CmsFailure, Severity};

/// Noise applied around the headline rating for each criterion
const CRITERIA_JITTER: f64 = 0.3;
/// Amount a failed criterion's target sits above its score
const TARGET_OFFSET: f64 = 0.3;
const MIN_SHORTFALL: f64 = 0.5;
const MAX_SHORTFALL: f64 = 2.5;
const MAX_FAILURES: usize = 4;

/// Score every canonical criterion as the star rating plus uniform noise,
/// clamped to [1.0, 5.0] and rounded to one decimal.
pub fn generate_criteria<R: Rng + ?Sized>(star_rating: f64, rng: &mut R) -> BTreeMap<String, f64> {
    CMS_CRITERIA
        .iter()
        .map(|name| {
            let noise = rng.gen_range(-CRITERIA_JITTER..=CRITERIA_JITTER);
            let score = round1((star_rating + noise).clamp(1.0, 5.0));
            (name.to_string(), score)
        })
        .collect()
}

/// Chance that a plan with this rating has any failures: 0 at 5 stars, 1 at 1 star.
pub fn failure_probability(star_rating: f64) -> f64 {
    ((5.0 - star_rating) / 4.0).clamp(0.0, 1.0)
}

/// Pick failing criteria for an underperforming plan.
///
/// Returns an empty list when the plan is judged compliant. Otherwise 1–4
/// distinct criteria from `criteria` are chosen, each with a target above
/// its score and an actual below the target.
pub fn generate_failures<R: Rng + ?Sized>(
    star_rating: f64,
    criteria: &BTreeMap<String, f64>,
    rng: &mut R,
) -> Vec<CmsFailure> {
    if criteria.is_empty() {
        return Vec::new();
    }
    let roll: f64 = rng.gen();
    if roll >= failure_probability(star_rating) {
        return Vec::new();
    }

    let names: Vec<&String> = criteria.keys().collect();
    let count = rng.gen_range(1..=MAX_FAILURES).min(names.len());

    names
        .choose_multiple(rng, count)
        .map(|name| {
            let score = criteria[*name];
            let target = round1(score + TARGET_OFFSET);
            let shortfall = rng.gen_range(MIN_SHORTFALL..=MAX_SHORTFALL);
            let actual = round1((target - shortfall).max(1.0));
            build_failure(name, target, actual)
        })
        .collect()
}

fn build_failure(criterion: &str, target: f64, actual: f64) -> CmsFailure {
    let impact = Severity::classify(target, actual);
    CmsFailure {
        criterion: criterion.to_string(),
        target,
        actual,
        impact,
        description: format!(
            "{criterion} scored {actual:.1} against a CMS target of {target:.1} ({impact} impact)"
        ),
        recommendations: recommendations_for(criterion)
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

/// Remediation guidance for a criterion
pub fn recommendations_for(criterion: &str) -> &'static [&'static str] {
    match criterion {
        "Staying Healthy" => &[
            "Expand outreach for annual wellness visits",
            "Send vaccine and screening reminders to members",
        ],
        "Managing Chronic Conditions" => &[
            "Enroll high-risk members in care management programs",
            "Track diabetes and blood pressure control measures monthly",
        ],
        "Member Experience" => &[
            "Review CAHPS survey results and act on low-scoring items",
            "Simplify access to specialists and referrals",
        ],
        "Member Complaints" => &[
            "Shorten grievance resolution times",
            "Analyze complaint trends to find root causes",
        ],
        "Customer Service" => &[
            "Reduce call center hold times",
            "Provide interpreter services on first contact",
        ],
        "Drug Safety" => &[
            "Strengthen medication review for high-risk drugs",
            "Coordinate with pharmacies on drug interaction alerts",
        ],
        "Drug Pricing Accuracy" => &[
            "Audit Plan Finder price submissions against claims",
            "Correct pricing file errors before each submission window",
        ],
        "Care Coordination" => &[
            "Share discharge information with primary care providers",
            "Follow up with members within 7 days of hospitalization",
        ],
        "Preventive Screenings" => &[
            "Run targeted campaigns for breast and colorectal cancer screening",
            "Offer in-home screening options",
        ],
        "Medication Adherence" => &[
            "Promote 90-day supplies and mail-order pharmacy",
            "Contact members with gaps in refills",
        ],
        "Access to Care" => &[
            "Expand the provider network in underserved counties",
            "Add telehealth appointment options",
        ],
        "Plan Responsiveness" => &[
            "Meet CMS timeliness standards for appeals",
            "Automate coverage determination workflows",
        ],
        _ => &["Develop a corrective action plan for this measure"],
    }
}
