use crate::constants;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Raw plan record as returned from an external source
pub type RawPlanData = serde_json::Value;

/// Declared shape of a source's records, used to pick field-name overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// CMS Medicare plan API (snake_case, contract/plan ids)
    MedicareApi,
    /// State Medicaid managed care listings
    MedicaidApi,
    /// Plans produced by the sample generator
    Sample,
    /// Previously normalized plans (camelCase canonical shape)
    Cached,
    /// Anything else
    Generic,
}

impl SourceKind {
    /// Parse a free-form source hint; unknown hints fall back to `Generic`.
    pub fn from_hint(hint: &str) -> Self {
        match hint.trim().to_lowercase().as_str() {
            "cms" | "medicare" | "medicare_api" | "medicare_gov" => SourceKind::MedicareApi,
            "medicaid" | "medicaid_api" => SourceKind::MedicaidApi,
            "sample" | "sample_data" | "generated" => SourceKind::Sample,
            "cache" | "cached" => SourceKind::Cached,
            _ => SourceKind::Generic,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::MedicareApi => constants::MEDICARE_API,
            SourceKind::MedicaidApi => constants::MEDICAID_API,
            SourceKind::Sample => constants::SAMPLE_DATA,
            SourceKind::Cached => constants::CACHE_SOURCE,
            SourceKind::Generic => constants::JSON_FILE,
        };
        f.write_str(name)
    }
}

/// Raw records fetched from one source, tagged with where they came from
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source_name: String,
    pub kind: SourceKind,
    pub records: Vec<RawPlanData>,
}

impl SourceBatch {
    pub fn new(source_name: impl Into<String>, kind: SourceKind, records: Vec<RawPlanData>) -> Self {
        Self {
            source_name: source_name.into(),
            kind,
            records,
        }
    }

    pub fn empty(source_name: impl Into<String>, kind: SourceKind) -> Self {
        Self::new(source_name, kind, Vec::new())
    }
}

/// Core trait that all plan data sources must implement
#[async_trait::async_trait]
pub trait PlanSource: Send + Sync {
    /// Provenance label for records from this source
    fn source_name(&self) -> &str;

    /// Shape of the records this source returns
    fn kind(&self) -> SourceKind;

    /// Fetch all raw plan records from this source
    async fn fetch_plans(&self) -> Result<Vec<RawPlanData>>;

    /// Fetch that never fails: errors are logged and mapped to an empty list.
    async fn fetch(&self) -> Vec<RawPlanData> {
        match self.fetch_plans().await {
            Ok(records) => records,
            Err(e) => {
                warn!(source = %self.source_name(), "Source fetch failed, continuing without it: {}", e);
                Vec::new()
            }
        }
    }
}
