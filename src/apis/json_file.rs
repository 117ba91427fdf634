use crate::constants::JSON_FILE;
use crate::error::{AggregatorError, Result};
use crate::types::{PlanSource, RawPlanData, SourceKind};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

use super::extract_records;

/// Third-party plan data from a JSON file on disk.
///
/// Accepts a bare array of records, a wrapped list, or a file written by
/// `export` (a `metadata` envelope around canonical plans).
pub struct JsonFileSource {
    name: String,
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self {
            name: format!("{}:{}", JSON_FILE, path.display()),
            path,
        }
    }
}

#[async_trait::async_trait]
impl PlanSource for JsonFileSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Generic
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch_plans(&self) -> Result<Vec<RawPlanData>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AggregatorError::unavailable(&self.name, format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let body: Value = serde_json::from_str(&content)?;
        if body.get("metadata").is_some() {
            debug!("Reading exported plan file");
        }
        let records = extract_records(&self.name, body)?;
        info!("Loaded {} records from {}", records.len(), self.path.display());
        Ok(records)
    }
}
