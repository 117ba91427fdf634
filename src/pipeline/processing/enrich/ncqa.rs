use rand::Rng;

use crate::constants::HIGH_QUALITY_ORGANIZATIONS;
use crate::domain::{NcqaLevel, NcqaRating};

const UPGRADE_PROBABILITY: f64 = 0.3;
const DOWNGRADE_PROBABILITY: f64 = 0.1;

/// Whether the organization matches the recognized high-quality allow-list
pub fn is_recognized_organization(organization: &str) -> bool {
    let lower = organization.to_lowercase();
    HIGH_QUALITY_ORGANIZATIONS
        .iter()
        .any(|name| lower.contains(name))
}

/// Derive an NCQA accreditation from the star rating, nudged by reputation.
pub fn generate_ncqa<R: Rng + ?Sized>(
    star_rating: f64,
    organization: &str,
    year: i32,
    rng: &mut R,
) -> NcqaRating {
    let mut index = star_rating.floor() as i64 - 1;

    if is_recognized_organization(organization) && rng.gen_bool(UPGRADE_PROBABILITY) {
        index += 1;
    }
    if rng.gen_bool(DOWNGRADE_PROBABILITY) {
        index -= 1;
    }

    let level = NcqaLevel::from_index(index);
    NcqaRating {
        level,
        score: level.score(),
        year,
        description: level.description().to_string(),
    }
}
