use anyhow::Result;
use medplan_aggregator::apis::json_file::JsonFileSource;
use medplan_aggregator::apis::sample_data::SampleDataSource;
use medplan_aggregator::app::{AggregateUseCase, DataOrigin, QueryUseCase};
use medplan_aggregator::config::Config;
use medplan_aggregator::constants;
use medplan_aggregator::domain::{PlanType, Severity};
use medplan_aggregator::export::{export_to_path, ExportFormat, JsonExport};
use medplan_aggregator::pipeline::{FailureFilter, FetchStatus, PlanFilter};
use medplan_aggregator::storage::{FileCacheStore, PlanCache};
use medplan_aggregator::types::PlanSource;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use uuid::Uuid;

fn write_partner_file(dir: &std::path::Path) -> Result<std::path::PathBuf> {
    let path = dir.join("partner_plans.json");
    let body = json!({
        "results": [
            {"plan_name": "Harbor Medicare Choice", "plan_type": "Medicare Advantage", "state": "MA", "organization": "Harbor Health", "star_rating": 4.0, "contract_id": "H2001"},
            {"plan_name": "Harbor Medicare Choice", "plan_type": "Medicare Advantage", "state": "MA", "organization": "Harbor Health", "star_rating": 4.0, "contract_id": "H2001"},
            {"plan_name": "Gulf Coast Medicaid", "plan_type": "Medicaid Managed Care", "state": "TX", "organization": "Gulf Coast Health", "members": "45,000"},
            {"unrelated": true}
        ]
    });
    std::fs::write(&path, serde_json::to_string(&body)?)?;
    Ok(path)
}

#[tokio::test]
async fn test_full_cycle_with_file_cache() -> Result<()> {
    let temp_dir = tempdir()?;
    let partner = write_partner_file(temp_dir.path())?;
    let cache = PlanCache::new(
        Arc::new(FileCacheStore::new(temp_dir.path().join("cache"))),
        chrono::Duration::days(7),
    );

    let sources: Vec<Arc<dyn PlanSource>> = vec![
        Arc::new(JsonFileSource::new(partner.clone())),
        Arc::new(JsonFileSource::new(temp_dir.path().join("missing.json"))),
    ];
    let use_case = AggregateUseCase::new(sources, Arc::new(SampleDataSource::new(10, Some(2))), Duration::from_secs(5))
        .with_cache(cache.clone())
        .with_seed(Some(42));

    let outcome = use_case.run(false).await;
    assert_eq!(outcome.origin, DataOrigin::Fresh);
    assert_eq!(outcome.plans.len(), 2);
    assert_eq!(outcome.duplicates_removed, 1);
    assert_eq!(outcome.skipped_records.len(), 1);
    assert_eq!(outcome.sources[0].status, FetchStatus::Ok);
    assert!(matches!(outcome.sources[1].status, FetchStatus::Failed(_)));
    assert_eq!(outcome.notices.len(), 1);

    // Sorted by state: MA before TX
    assert_eq!(outcome.plans[0].state, "MA");
    assert_eq!(outcome.plans[1].plan_type, PlanType::Medicaid);
    assert_eq!(outcome.plans[1].members, 45_000);

    // The cache now serves the same plans
    assert_eq!(cache.load().await, Some(outcome.plans.clone()));
    let cached = use_case.run(false).await;
    assert_eq!(cached.origin, DataOrigin::Cache);
    assert_eq!(cached.stats, outcome.stats);
    Ok(())
}

#[tokio::test]
async fn test_export_and_reimport_round_trip() -> Result<()> {
    let temp_dir = tempdir()?;
    let use_case = AggregateUseCase::new(Vec::new(), Arc::new(SampleDataSource::new(12, Some(5))), Duration::from_secs(5))
        .with_seed(Some(5));
    let outcome = use_case.run(true).await;
    assert_eq!(outcome.origin, DataOrigin::SampleFallback);
    assert_eq!(outcome.plans.len(), 12 - outcome.duplicates_removed);

    let json_path = temp_dir.path().join("export").join("plans.json");
    export_to_path(&outcome.plans, &json_path, ExportFormat::Json, Uuid::new_v4())?;
    let parsed: JsonExport = serde_json::from_str(&std::fs::read_to_string(&json_path)?)?;
    assert_eq!(parsed.metadata.record_count, outcome.plans.len());
    assert_eq!(parsed.metadata.sources, vec![constants::SAMPLE_DATA.to_string()]);

    let csv_path = temp_dir.path().join("export").join("plans.csv");
    export_to_path(&outcome.plans, &csv_path, ExportFormat::Csv, Uuid::new_v4())?;
    let mut reader = csv::Reader::from_path(&csv_path)?;
    assert_eq!(reader.records().count(), outcome.plans.len());

    // An exported file is itself a valid source, and its derived metrics are kept
    let reimport = AggregateUseCase::new(
        vec![Arc::new(JsonFileSource::new(json_path)) as Arc<dyn PlanSource>],
        Arc::new(SampleDataSource::new(1, Some(1))),
        Duration::from_secs(5),
    )
    .with_seed(Some(99));
    let again = reimport.run(true).await;
    assert_eq!(again.origin, DataOrigin::Fresh);
    assert_eq!(again.plans.len(), outcome.plans.len());
    for (before, after) in outcome.plans.iter().zip(&again.plans) {
        assert_eq!(before.name, after.name);
        assert_eq!(before.star_rating, after.star_rating);
        assert_eq!(before.cms_criteria, after.cms_criteria);
        assert_eq!(before.cms_failures, after.cms_failures);
    }
    Ok(())
}

#[tokio::test]
async fn test_query_over_aggregated_plans() -> Result<()> {
    let mut config = Config::default();
    config.pipeline.sources = vec![constants::SAMPLE_DATA.to_string()];
    config.pipeline.seed = Some(8);
    config.sample_data.plan_count = 30;
    config.sample_data.seed = Some(8);
    config.cache.enabled = false;

    let outcome = AggregateUseCase::from_config(&config).run(false).await;
    assert_eq!(outcome.origin, DataOrigin::Fresh);

    let filter = PlanFilter::new()
        .with_type(PlanType::Medicare)
        .with_failure(FailureFilter::Severity(Severity::Critical));
    let result = QueryUseCase::new(&outcome.plans).query(&filter);
    assert_eq!(result.total_available, outcome.plans.len());
    assert_eq!(result.stats.total_count, result.plans.len());
    for plan in &result.plans {
        assert_eq!(plan.plan_type, PlanType::Medicare);
        assert!(plan.cms_failures.iter().any(|f| f.severity() == Severity::Critical));
    }
    Ok(())
}
