pub mod cms_api;
pub mod json_file;
pub mod sample_data;

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::constants;
use crate::error::{AggregatorError, Result};
use crate::types::{PlanSource, RawPlanData};

use cms_api::CmsApiSource;
use json_file::JsonFileSource;
use sample_data::SampleDataSource;

/// Keys under which list endpoints commonly wrap their records
const ENVELOPE_KEYS: &[&str] = &["plans", "data", "results", "items", "records"];

/// Pull the record list out of a response body: either a bare array or an
/// object wrapping one under a well-known key.
pub fn extract_records(source_name: &str, body: Value) -> Result<Vec<RawPlanData>> {
    match body {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(records)) => Some(records),
                _ => None,
            })
            .ok_or_else(|| {
                AggregatorError::unavailable(source_name, "response object holds no record list")
            }),
        other => Err(AggregatorError::unavailable(
            source_name,
            format!("expected a JSON array or object, got {}", type_name(&other)),
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Build the adapters for one source name. Returns an empty list when the
/// source is named but not configured (e.g. an API with no URL).
pub fn create_source(name: &str, config: &Config) -> Vec<Arc<dyn PlanSource>> {
    let timeout = config.fetch_timeout();
    match name {
        constants::MEDICARE_API => match config.medicare_api.url.as_deref() {
            Some(url) => vec![Arc::new(CmsApiSource::medicare(url, config.medicare_api.page_size, timeout)) as Arc<dyn PlanSource>],
            None => {
                info!("No medicare_api.url configured, skipping source");
                Vec::new()
            }
        },
        constants::MEDICAID_API => match config.medicaid_api.url.as_deref() {
            Some(url) => vec![Arc::new(CmsApiSource::medicaid(url, config.medicaid_api.page_size, timeout)) as Arc<dyn PlanSource>],
            None => {
                info!("No medicaid_api.url configured, skipping source");
                Vec::new()
            }
        },
        constants::SAMPLE_DATA => vec![Arc::new(sample_source(config)) as Arc<dyn PlanSource>],
        constants::JSON_FILE => config
            .json_file
            .paths
            .iter()
            .map(|path| Arc::new(JsonFileSource::new(path.clone())) as Arc<dyn PlanSource>)
            .collect(),
        other => {
            warn!("Unknown source: {}", other);
            Vec::new()
        }
    }
}

/// Every configured adapter, in the order sources are listed
pub fn create_sources(config: &Config) -> Vec<Arc<dyn PlanSource>> {
    config
        .pipeline
        .sources
        .iter()
        .flat_map(|name| create_source(name, config))
        .collect()
}

/// The generated-data adapter, also used as the fallback when every source is empty
pub fn sample_source(config: &Config) -> SampleDataSource {
    SampleDataSource::new(config.sample_data.plan_count, config.sample_data.seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_bare_array() {
        let records = extract_records("t", json!([{"name": "A"}, {"name": "B"}])).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_extract_wrapped_list() {
        let records = extract_records("t", json!({"meta": {}, "data": [{"name": "A"}]})).unwrap();
        assert_eq!(records, vec![json!({"name": "A"})]);
        let records = extract_records("t", json!({"plans": [], "metadata": {"recordCount": 0}})).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_extract_rejects_other_shapes() {
        assert!(matches!(
            extract_records("t", json!({"message": "rate limited"})),
            Err(AggregatorError::SourceUnavailable { .. })
        ));
        assert!(extract_records("t", json!("nope")).is_err());
    }

    #[test]
    fn test_unconfigured_apis_are_skipped() {
        let config = Config::default();
        let sources = create_sources(&config);
        let names: Vec<&str> = sources.iter().map(|s| s.source_name()).collect();
        assert_eq!(names, vec![constants::SAMPLE_DATA]);
    }

    #[test]
    fn test_configured_sources_keep_order() {
        let mut config = Config::default();
        config.medicaid_api.url = Some("http://127.0.0.1:9/medicaid".to_string());
        config.json_file.paths = vec!["a.json".into(), "b.json".into()];
        config.pipeline.sources = vec![
            constants::JSON_FILE.to_string(),
            constants::MEDICAID_API.to_string(),
        ];
        let sources = create_sources(&config);
        let names: Vec<&str> = sources.iter().map(|s| s.source_name()).collect();
        assert_eq!(names, vec!["json_file:a.json", "json_file:b.json", constants::MEDICAID_API]);
    }
}
