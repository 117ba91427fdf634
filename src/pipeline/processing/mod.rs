// Pipeline processing: normalization, derived metrics, dedupe, merge and filtering

pub mod aggregate;
pub mod dedupe;
pub mod enrich;
pub mod filter;
pub mod normalize;
