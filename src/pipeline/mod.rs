// Data processing pipeline: concurrent source fetch, then the pure processing stages

pub mod orchestrator;
pub mod processing;

// Re-export key types and functions from each stage
pub use orchestrator::{FetchStatus, SourceFetch, SourceOrchestrator};
pub use processing::aggregate::{compute_stats, merge, MergeResult, PlanStats};
pub use processing::dedupe::{dedupe, DedupeResult, DuplicateGroup};
pub use processing::filter::{FailureFilter, PlanFilter};
pub use processing::normalize::PlanNormalizer;
