use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::error::AggregatorError;
use crate::metrics::{emit_counter_for_source, emit_histogram, MetricName};
use crate::types::{PlanSource, SourceBatch};

/// Outcome for a single source in a fetch round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Ok,
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct SourceFetch {
    pub batch: SourceBatch,
    pub status: FetchStatus,
}

/// Fetches every source concurrently and gathers the results in declaration order
pub struct SourceOrchestrator {
    sources: Vec<Arc<dyn PlanSource>>,
    timeout: Duration,
}

impl SourceOrchestrator {
    pub fn new(sources: Vec<Arc<dyn PlanSource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.source_name().to_string()).collect()
    }

    /// Fan out to every source, wait for all of them to settle, fan back in.
    ///
    /// A source that errors or exceeds the timeout contributes an empty batch;
    /// it never aborts the others.
    #[instrument(skip(self), fields(sources = self.sources.len()))]
    pub async fn fetch_all(&self) -> Vec<SourceFetch> {
        let mut slots: Vec<Option<SourceFetch>> = vec![None; self.sources.len()];
        let mut tasks = JoinSet::new();

        for (slot, source) in self.sources.iter().enumerate() {
            let source = Arc::clone(source);
            let timeout = self.timeout;
            tasks.spawn(async move {
                let started = Instant::now();
                let name = source.source_name().to_string();
                let kind = source.kind();
                let outcome = tokio::time::timeout(timeout, source.fetch_plans()).await;
                emit_histogram(MetricName::SourceFetchDuration, started.elapsed().as_secs_f64());

                let fetch = match outcome {
                    Ok(Ok(records)) => {
                        info!(source = %name, "Fetched {} raw records", records.len());
                        emit_counter_for_source(MetricName::SourceFetchSuccess, &name, 1);
                        emit_counter_for_source(MetricName::SourceRecordsFetched, &name, records.len() as u64);
                        SourceFetch {
                            batch: SourceBatch::new(name, kind, records),
                            status: FetchStatus::Ok,
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(source = %name, "Source unavailable: {}", e);
                        emit_counter_for_source(MetricName::SourceFetchFailure, &name, 1);
                        SourceFetch {
                            batch: SourceBatch::empty(name, kind),
                            status: FetchStatus::Failed(e.to_string()),
                        }
                    }
                    Err(_) => {
                        let err = AggregatorError::Timeout {
                            source_name: name.clone(),
                            timeout,
                        };
                        warn!(source = %name, "{}", err);
                        emit_counter_for_source(MetricName::SourceFetchTimeout, &name, 1);
                        SourceFetch {
                            batch: SourceBatch::empty(name, kind),
                            status: FetchStatus::TimedOut,
                        }
                    }
                };
                (slot, fetch)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, fetch)) => slots[slot] = Some(fetch),
                Err(e) => warn!("Source task ended abnormally: {}", e),
            }
        }

        // Any slot still empty belongs to a task that panicked
        slots
            .into_iter()
            .zip(self.sources.iter())
            .map(|(fetch, source)| {
                fetch.unwrap_or_else(|| SourceFetch {
                    batch: SourceBatch::empty(source.source_name(), source.kind()),
                    status: FetchStatus::Failed("task aborted".to_string()),
                })
            })
            .collect()
    }
}
