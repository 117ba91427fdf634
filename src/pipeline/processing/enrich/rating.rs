use rand::Rng;

/// Synthesized rating buckets with their sampling weights.
/// Bell-shaped around 3.5–4.0; weights sum to 1.0.
pub const RATING_DISTRIBUTION: [(f64, f64); 7] = [
    (5.0, 0.05),
    (4.5, 0.10),
    (4.0, 0.20),
    (3.5, 0.25),
    (3.0, 0.20),
    (2.5, 0.15),
    (2.0, 0.05),
];

/// Draw a star rating from the bucket distribution using cumulative weights.
pub fn synthesize_star_rating<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let roll: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (rating, weight) in RATING_DISTRIBUTION {
        cumulative += weight;
        if roll < cumulative {
            return rating;
        }
    }
    // roll landed in the rounding slack above the last cumulative weight
    RATING_DISTRIBUTION[RATING_DISTRIBUTION.len() - 1].0
}
