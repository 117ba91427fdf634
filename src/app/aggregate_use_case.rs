use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::apis;
use crate::config::Config;
use crate::domain::Plan;
use crate::error::AggregatorError;
use crate::metrics::{emit_counter, MetricName};
use crate::pipeline::processing::dedupe::{dedupe, DuplicateGroup};
use crate::pipeline::{compute_stats, merge, FetchStatus, PlanNormalizer, PlanStats, SourceOrchestrator};
use crate::storage::{FileCacheStore, PlanCache};
use crate::types::{PlanSource, SourceBatch};

/// Where the plans of a run came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    Cache,
    Fresh,
    SampleFallback,
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DataOrigin::Cache => "cache",
            DataOrigin::Fresh => "live sources",
            DataOrigin::SampleFallback => "sample data (fallback)",
        };
        f.write_str(label)
    }
}

/// How one source fared during a fetch round
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub name: String,
    pub status: FetchStatus,
    pub records: usize,
}

#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub plans: Vec<Plan>,
    pub stats: PlanStats,
    pub origin: DataOrigin,
    pub sources: Vec<SourceReport>,
    pub duplicates_removed: usize,
    pub duplicate_groups: Vec<DuplicateGroup>,
    /// (source name, record index) of records skipped as unidentifiable
    pub skipped_records: Vec<(String, usize)>,
    /// Conditions worth surfacing to the user
    pub notices: Vec<String>,
}

/// Runs one aggregation cycle: cache, fetch, merge, dedupe, stats, cache write
pub struct AggregateUseCase {
    orchestrator: SourceOrchestrator,
    fallback: Arc<dyn PlanSource>,
    cache: Option<PlanCache>,
    normalizer: PlanNormalizer,
    dedupe: bool,
    seed: Option<u64>,
}

impl AggregateUseCase {
    pub fn new(sources: Vec<Arc<dyn PlanSource>>, fallback: Arc<dyn PlanSource>, timeout: Duration) -> Self {
        Self {
            orchestrator: SourceOrchestrator::new(sources, timeout),
            fallback,
            cache: None,
            normalizer: PlanNormalizer::new(),
            dedupe: true,
            seed: None,
        }
    }

    /// Wire sources, fallback and the file cache from configuration
    pub fn from_config(config: &Config) -> Self {
        let mut use_case = Self::new(
            apis::create_sources(config),
            Arc::new(apis::sample_source(config)),
            config.fetch_timeout(),
        )
        .with_dedupe(config.pipeline.dedupe)
        .with_seed(config.pipeline.seed);
        if config.cache.enabled {
            let store = Arc::new(FileCacheStore::new(config.cache.dir.clone()));
            use_case = use_case.with_cache(PlanCache::new(store, config.cache_ttl()));
        }
        use_case
    }

    pub fn with_cache(mut self, cache: PlanCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_dedupe(mut self, enabled: bool) -> Self {
        self.dedupe = enabled;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_normalizer(mut self, normalizer: PlanNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn source_names(&self) -> Vec<String> {
        self.orchestrator.source_names()
    }

    /// Produce a dataset. Never fails: a cache miss falls through to the
    /// sources, and all-empty sources fall back to generated sample data.
    #[instrument(skip(self))]
    pub async fn run(&self, refresh: bool) -> AggregateOutcome {
        if !refresh {
            if let Some(outcome) = self.load_cached().await {
                return outcome;
            }
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut notices = Vec::new();

        let fetches = self.orchestrator.fetch_all().await;
        let sources: Vec<SourceReport> = fetches
            .iter()
            .map(|f| SourceReport {
                name: f.batch.source_name.clone(),
                status: f.status.clone(),
                records: f.batch.records.len(),
            })
            .collect();
        for report in &sources {
            match &report.status {
                FetchStatus::Ok => {}
                FetchStatus::Failed(reason) => {
                    notices.push(format!("{} unavailable: {}", report.name, reason));
                }
                FetchStatus::TimedOut => notices.push(
                    AggregatorError::Timeout {
                        source_name: report.name.clone(),
                        timeout: self.orchestrator.timeout(),
                    }
                    .to_string(),
                ),
            }
        }

        let batches: Vec<SourceBatch> = fetches.into_iter().map(|f| f.batch).collect();
        let mut merged = merge(&batches, &self.normalizer, &mut rng);
        let mut origin = DataOrigin::Fresh;

        if merged.plans.is_empty() {
            warn!("{}, falling back to sample data", AggregatorError::EmptyResult);
            notices.push(format!("{}; showing generated sample data", AggregatorError::EmptyResult));
            emit_counter(MetricName::SampleFallbackUsed, 1);

            let records = self.fallback.fetch().await;
            let batch = SourceBatch::new(self.fallback.source_name(), self.fallback.kind(), records);
            merged = merge(&[batch], &self.normalizer, &mut rng);
            origin = DataOrigin::SampleFallback;
        }

        let (plans, duplicates_removed, duplicate_groups) = if self.dedupe {
            let result = dedupe(&merged.plans);
            (result.unique_plans, result.removed_count, result.groups)
        } else {
            (merged.plans, 0, Vec::new())
        };
        let stats = compute_stats(&plans);

        // Fallback data is never cached so the next run retries the real sources
        if origin == DataOrigin::Fresh {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.store(&plans).await {
                    warn!("Failed to write plan cache: {}", e);
                    notices.push(format!("cache not updated: {e}"));
                }
            }
        }

        info!(
            "Aggregated {} plans from {} ({} duplicates removed)",
            plans.len(),
            origin,
            duplicates_removed
        );

        AggregateOutcome {
            plans,
            stats,
            origin,
            sources,
            duplicates_removed,
            duplicate_groups,
            skipped_records: merged.skipped,
            notices,
        }
    }

    async fn load_cached(&self) -> Option<AggregateOutcome> {
        let plans = self.cache.as_ref()?.load().await?;
        if plans.is_empty() {
            return None;
        }
        let stats = compute_stats(&plans);
        Some(AggregateOutcome {
            plans,
            stats,
            origin: DataOrigin::Cache,
            sources: Vec::new(),
            duplicates_removed: 0,
            duplicate_groups: Vec::new(),
            skipped_records: Vec::new(),
            notices: Vec::new(),
        })
    }
}
