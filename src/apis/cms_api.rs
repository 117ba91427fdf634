use crate::constants::{MEDICAID_API, MEDICARE_API};
use crate::error::{AggregatorError, Result};
use crate::types::{PlanSource, RawPlanData, SourceKind};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::extract_records;

/// Remote plan listing (CMS Medicare plan data or a state Medicaid listing)
pub struct CmsApiSource {
    name: &'static str,
    kind: SourceKind,
    url: String,
    page_size: Option<u32>,
    client: reqwest::Client,
}

impl CmsApiSource {
    fn new(
        name: &'static str,
        kind: SourceKind,
        url: &str,
        page_size: Option<u32>,
        timeout: Duration,
    ) -> Self {
        // Builder only fails if the TLS backend cannot initialize
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("medplan_aggregator/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            name,
            kind,
            url: url.to_string(),
            page_size,
            client,
        }
    }

    pub fn medicare(url: &str, page_size: Option<u32>, timeout: Duration) -> Self {
        Self::new(MEDICARE_API, SourceKind::MedicareApi, url, page_size, timeout)
    }

    pub fn medicaid(url: &str, page_size: Option<u32>, timeout: Duration) -> Self {
        Self::new(MEDICAID_API, SourceKind::MedicaidApi, url, page_size, timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl PlanSource for CmsApiSource {
    fn source_name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    #[instrument(skip(self), fields(source = self.name))]
    async fn fetch_plans(&self) -> Result<Vec<RawPlanData>> {
        debug!("Fetching plans from {}", self.url);
        let mut request = self.client.get(&self.url);
        if let Some(size) = self.page_size {
            request = request.query(&[("size", size)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AggregatorError::unavailable(
                self.name,
                format!("HTTP {} from {}", status, self.url),
            ));
        }

        let body: Value = response.json().await?;
        let records = extract_records(self.name, body)?;
        info!("Successfully fetched {} plans from {}", records.len(), self.name);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_kind() {
        let medicare = CmsApiSource::medicare("https://example.org/a", None, Duration::from_secs(1));
        assert_eq!(medicare.source_name(), MEDICARE_API);
        assert_eq!(medicare.kind(), SourceKind::MedicareApi);

        let medicaid = CmsApiSource::medicaid("https://example.org/b", Some(500), Duration::from_secs(1));
        assert_eq!(medicaid.source_name(), MEDICAID_API);
        assert_eq!(medicaid.kind(), SourceKind::MedicaidApi);
        assert_eq!(medicaid.url(), "https://example.org/b");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_soft() {
        // Nothing listens on the discard port locally
        let source = CmsApiSource::medicare("http://127.0.0.1:9/plans", None, Duration::from_secs(2));
        assert!(source.fetch_plans().await.is_err());
        assert!(source.fetch().await.is_empty());
    }
}
