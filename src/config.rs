use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::constants::{self, DEFAULT_CACHE_TTL_DAYS, DEFAULT_FETCH_TIMEOUT_SECS};
use crate::error::{AggregatorError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub medicare_api: ApiSourceConfig,
    pub medicaid_api: ApiSourceConfig,
    pub sample_data: SampleDataConfig,
    pub json_file: JsonFileConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sources to fetch, in concatenation order
    pub sources: Vec<String>,
    pub fetch_timeout_secs: u64,
    pub dedupe: bool,
    /// Seed for synthesized quality data; random when unset
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiSourceConfig {
    /// Endpoint returning plan records; the source is skipped when unset
    pub url: Option<String>,
    /// Query-string page size, when the endpoint supports one
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SampleDataConfig {
    pub plan_count: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonFileConfig {
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            medicare_api: ApiSourceConfig::default(),
            medicaid_api: ApiSourceConfig::default(),
            sample_data: SampleDataConfig::default(),
            json_file: JsonFileConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                constants::MEDICARE_API.to_string(),
                constants::MEDICAID_API.to_string(),
                constants::JSON_FILE.to_string(),
                constants::SAMPLE_DATA.to_string(),
            ],
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            dedupe: true,
            seed: None,
        }
    }
}

impl Default for SampleDataConfig {
    fn default() -> Self {
        Self {
            plan_count: 60,
            seed: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("cache"),
            ttl_days: DEFAULT_CACHE_TTL_DAYS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

impl Config {
    /// Load `path`; every section is optional.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AggregatorError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `.env`, then the config file (defaults when it does not exist),
    /// then apply `MEDPLAN_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("MEDPLAN_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("MEDPLAN_FETCH_TIMEOUT_SECS") {
            self.pipeline.fetch_timeout_secs = v.trim().parse().map_err(|_| {
                AggregatorError::Config(format!("MEDPLAN_FETCH_TIMEOUT_SECS is not a number: {v}"))
            })?;
        }
        if let Ok(v) = std::env::var("MEDPLAN_CACHE_DIR") {
            self.cache.dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MEDPLAN_METRICS_PORT") {
            self.metrics.port = v.trim().parse().ok();
        }
        if let Ok(v) = std::env::var("MEDPLAN_MEDICARE_API_URL") {
            self.medicare_api.url = Some(v);
        }
        if let Ok(v) = std::env::var("MEDPLAN_MEDICAID_API_URL") {
            self.medicaid_api.url = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.fetch_timeout_secs == 0 {
            return Err(AggregatorError::Config(
                "pipeline.fetch_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.cache.ttl_days <= 0 {
            return Err(AggregatorError::Config(
                "cache.ttl_days must be greater than zero".to_string(),
            ));
        }
        let supported = constants::get_supported_sources();
        if let Some(unknown) = self
            .pipeline
            .sources
            .iter()
            .find(|s| !supported.contains(&s.as_str()))
        {
            return Err(AggregatorError::Config(format!(
                "Unknown source '{}'. Available: {}",
                unknown,
                supported.join(", ")
            )));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.fetch_timeout_secs)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache.ttl_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pipeline.fetch_timeout_secs, 12);
        assert!(config.pipeline.dedupe);
        assert_eq!(config.cache.ttl_days, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[pipeline]
sources = ["sample_data"]
seed = 7

[medicare_api]
url = "https://example.org/plans.json"

[cache]
ttl_days = 3
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.pipeline.sources, vec!["sample_data".to_string()]);
        assert_eq!(config.pipeline.seed, Some(7));
        assert_eq!(config.pipeline.fetch_timeout_secs, 12);
        assert_eq!(config.medicare_api.url.as_deref(), Some("https://example.org/plans.json"));
        assert_eq!(config.cache.ttl_days, 3);
        assert_eq!(config.cache.dir, PathBuf::from("cache"));
    }

    #[test]
    fn test_unknown_source_rejected() {
        let mut config = Config::default();
        config.pipeline.sources.push("carrier_pigeon".to_string());
        assert!(matches!(config.validate(), Err(AggregatorError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = Config::load_from(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(AggregatorError::Config(_))));
    }
}
