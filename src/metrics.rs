//! Metrics for the aggregation pipeline.
//!
//! Metric names live in one enum so call sites never spell out strings.
//! Nothing is recorded unless a recorder is installed; `init_metrics` installs
//! the Prometheus exporter when a port is configured.

use std::fmt;
use std::net::SocketAddr;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Source metrics
    SourceFetchSuccess,
    SourceFetchFailure,
    SourceFetchTimeout,
    SourceFetchDuration,
    SourceRecordsFetched,

    // Normalize metrics
    NormalizeRecordsProcessed,
    NormalizeRecordsSkipped,
    NormalizeRatingsSynthesized,

    // Dedupe and merge metrics
    DedupeDuplicatesRemoved,
    MergeRunsTotal,
    MergePlansTotal,
    MergeDuration,

    // Cache metrics
    CacheHits,
    CacheMisses,
    CacheExpired,
    CacheCorruptions,
    CacheWrites,

    // Export metrics
    ExportRecordsWritten,
    SampleFallbackUsed,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourceFetchSuccess => "medplan_source_fetch_success_total",
            MetricName::SourceFetchFailure => "medplan_source_fetch_failure_total",
            MetricName::SourceFetchTimeout => "medplan_source_fetch_timeout_total",
            MetricName::SourceFetchDuration => "medplan_source_fetch_duration_seconds",
            MetricName::SourceRecordsFetched => "medplan_source_records_fetched_total",

            MetricName::NormalizeRecordsProcessed => "medplan_normalize_records_processed_total",
            MetricName::NormalizeRecordsSkipped => "medplan_normalize_records_skipped_total",
            MetricName::NormalizeRatingsSynthesized => "medplan_normalize_ratings_synthesized_total",

            MetricName::DedupeDuplicatesRemoved => "medplan_dedupe_duplicates_removed_total",
            MetricName::MergeRunsTotal => "medplan_merge_runs_total",
            MetricName::MergePlansTotal => "medplan_merge_plans",
            MetricName::MergeDuration => "medplan_merge_duration_seconds",

            MetricName::CacheHits => "medplan_cache_hits_total",
            MetricName::CacheMisses => "medplan_cache_misses_total",
            MetricName::CacheExpired => "medplan_cache_expired_total",
            MetricName::CacheCorruptions => "medplan_cache_corruptions_total",
            MetricName::CacheWrites => "medplan_cache_writes_total",

            MetricName::ExportRecordsWritten => "medplan_export_records_written_total",
            MetricName::SampleFallbackUsed => "medplan_sample_fallback_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn emit_counter(name: MetricName, value: u64) {
    metrics::counter!(name.as_str()).increment(value);
}

pub fn emit_counter_for_source(name: MetricName, source: &str, value: u64) {
    metrics::counter!(name.as_str(), "source" => source.to_string()).increment(value);
}

pub fn emit_histogram(name: MetricName, value: f64) {
    metrics::histogram!(name.as_str()).record(value);
}

pub fn emit_gauge(name: MetricName, value: f64) {
    metrics::gauge!(name.as_str()).set(value);
}

/// Install the Prometheus exporter on `port`, if one is configured.
pub fn init_metrics(port: Option<u16>) {
    let Some(port) = port else {
        return;
    };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            info!("Prometheus exporter listening on http://{}/metrics", addr);
        }
        Err(e) => {
            warn!("Prometheus exporter install failed (possibly already installed): {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        let names = [
            MetricName::SourceFetchSuccess,
            MetricName::NormalizeRecordsSkipped,
            MetricName::CacheCorruptions,
            MetricName::ExportRecordsWritten,
        ];
        for name in names {
            assert!(name.to_string().starts_with("medplan_"));
        }
    }

    #[test]
    fn test_emitting_without_recorder_is_a_no_op() {
        emit_counter(MetricName::CacheHits, 1);
        emit_counter_for_source(MetricName::SourceFetchFailure, "medicare_api", 1);
        emit_histogram(MetricName::MergeDuration, 0.5);
        emit_gauge(MetricName::MergePlansTotal, 10.0);
    }
}
