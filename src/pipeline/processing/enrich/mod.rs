//! Derived quality metrics.
//!
//! Star ratings, CMS criteria scores, criteria failures and NCQA levels are
//! synthesized around a plan's headline rating. All randomness comes from the
//! caller's `Rng`, so a seeded `StdRng` makes runs reproducible.

pub mod criteria;
pub mod ncqa;
pub mod rating;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{CmsFailure, NcqaRating};

pub use criteria::{failure_probability, generate_criteria, generate_failures};
pub use ncqa::generate_ncqa;
pub use rating::synthesize_star_rating;

/// Everything derived from a plan's star rating and organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub cms_criteria: BTreeMap<String, f64>,
    pub cms_failures: Vec<CmsFailure>,
    pub ncqa_rating: NcqaRating,
}

/// Generate criteria, failures and NCQA rating in one pass.
pub fn derive_quality_metrics<R: Rng + ?Sized>(
    star_rating: f64,
    organization: &str,
    year: i32,
    rng: &mut R,
) -> QualityMetrics {
    let cms_criteria = generate_criteria(star_rating, rng);
    let cms_failures = generate_failures(star_rating, &cms_criteria, rng);
    let ncqa_rating = generate_ncqa(star_rating, organization, year, rng);
    QualityMetrics {
        cms_criteria,
        cms_failures,
        ncqa_rating,
    }
}
