use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use medplan_aggregator::app::{AggregateOutcome, AggregateUseCase, QueryUseCase};
use medplan_aggregator::config::Config;
use medplan_aggregator::export::{export_to_path, ExportFormat};
use medplan_aggregator::pipeline::{FetchStatus, PlanFilter, PlanStats};
use medplan_aggregator::storage::{FileCacheStore, PlanCache};
use medplan_aggregator::{constants, logging, metrics};

#[derive(Parser)]
#[command(name = "medplan_aggregator")]
#[command(about = "Aggregates Medicare/Medicaid plan data from multiple sources")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to config.toml (defaults to $MEDPLAN_CONFIG, then ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, merge and deduplicate plans, then print a summary
    Run {
        /// Ignore the cache and fetch every source
        #[arg(long)]
        refresh: bool,
        /// Specific sources to run (comma-separated). Available: medicare_api, medicaid_api, json_file, sample_data
        #[arg(long)]
        sources: Option<String>,
    },
    /// Filter and search the aggregated plans
    Query {
        #[arg(long)]
        refresh: bool,
        #[command(flatten)]
        filter: FilterArgs,
        /// Maximum plans to print
        #[arg(long, default_value_t = 25)]
        limit: usize,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the (optionally filtered) plans to a CSV or JSON file
    Export {
        #[arg(long)]
        refresh: bool,
        /// Output file; the format follows the extension unless --format is given
        #[arg(long, short)]
        output: PathBuf,
        /// csv or json
        #[arg(long)]
        format: Option<String>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Fetch fresh data and list the duplicate groups that were removed
    DedupeReport,
    /// Manage the plan cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete the cached plan list
    Clear,
}

#[derive(Args)]
struct FilterArgs {
    /// medicare, medicaid or all
    #[arg(long = "type")]
    plan_type: Option<String>,
    /// Minimum star rating
    #[arg(long)]
    min_rating: Option<f64>,
    /// Exact state code, e.g. CA
    #[arg(long)]
    state: Option<String>,
    /// Northeast, Midwest, Southeast, Southwest, West or Other
    #[arg(long)]
    region: Option<String>,
    /// none, any, critical, high, medium or low
    #[arg(long)]
    failures: Option<String>,
    /// Free-text search over name, state, region, type and organization
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> Result<PlanFilter> {
        PlanFilter::from_inputs(
            self.plan_type.as_deref(),
            self.min_rating,
            self.state.as_deref(),
            self.region.as_deref(),
            self.failures.as_deref(),
            self.search.as_deref(),
        )
        .map_err(anyhow::Error::msg)
    }
}

fn print_stats(stats: &PlanStats) {
    println!("\n📊 Plan Statistics:");
    println!("   Total plans: {}", stats.total_count);
    for (plan_type, count) in &stats.count_by_type {
        println!("   {}: {}", plan_type, count);
    }
    println!("   States: {}", stats.distinct_states);
    println!("   Organizations: {}", stats.distinct_organizations);
    println!("   Total members: {}", stats.total_members);
    println!("   Average Medicare star rating: {}", stats.average_star_rating_display());
    if !stats.count_by_region.is_empty() {
        let regions: Vec<String> = stats
            .count_by_region
            .iter()
            .map(|(region, count)| format!("{region} {count}"))
            .collect();
        println!("   Regions: {}", regions.join(", "));
    }
    println!(
        "   Plans with CMS failures: {} ({} failures)",
        stats.failures.plans_with_failures, stats.failures.total_failures
    );
    for top in &stats.failures.top_criteria {
        println!("      - {}: {}", top.criterion, top.count);
    }
}

fn print_outcome(outcome: &AggregateOutcome) {
    println!("\n📥 Data origin: {}", outcome.origin);
    for source in &outcome.sources {
        match &source.status {
            FetchStatus::Ok => println!("   ✅ {}: {} records", source.name, source.records),
            FetchStatus::Failed(reason) => println!("   ❌ {}: {}", source.name, reason),
            FetchStatus::TimedOut => println!("   ⏱️  {}: timed out", source.name),
        }
    }
    if !outcome.skipped_records.is_empty() {
        println!("   Skipped records: {}", outcome.skipped_records.len());
    }
    if outcome.duplicates_removed > 0 {
        println!("   Duplicates removed: {}", outcome.duplicates_removed);
    }
    if !outcome.notices.is_empty() {
        println!("\n⚠️  Notices:");
        for notice in &outcome.notices {
            println!("   - {}", notice);
        }
    }
}

fn parse_format(format: Option<&str>, output: &std::path::Path) -> Result<ExportFormat> {
    match format.map(|f| f.trim().to_lowercase()) {
        Some(f) if f == "csv" => Ok(ExportFormat::Csv),
        Some(f) if f == "json" => Ok(ExportFormat::Json),
        Some(other) => bail!("Unknown export format: {other} (expected csv or json)"),
        None => ExportFormat::from_path(output)
            .with_context(|| format!("Cannot infer export format from {}; pass --format", output.display())),
    }
}

/// A cached dataset may come from other sources, so a source selection always fetches
fn must_refresh(refresh: bool, sources: Option<&str>) -> bool {
    refresh || sources.is_some()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Initialize logging and metrics
    logging::init_logging(&config.logging.dir);
    metrics::init_metrics(config.metrics.port);

    match cli.command {
        Commands::Run { refresh, sources } => {
            println!("🚀 Running plan aggregation...");
            let refresh = must_refresh(refresh, sources.as_deref());
            if let Some(list) = sources {
                let names: Vec<String> = list.split(',').map(|s| s.trim().to_string()).collect();
                for name in &names {
                    if !constants::get_supported_sources().contains(&name.as_str()) {
                        println!("⚠️  Unknown source: {}", name);
                    }
                }
                config.pipeline.sources = names;
            }

            let use_case = AggregateUseCase::from_config(&config);
            info!(sources = ?use_case.source_names(), "Starting aggregation");
            let outcome = use_case.run(refresh).await;
            print_outcome(&outcome);
            print_stats(&outcome.stats);
            println!("\n✅ Aggregation complete: {} plans", outcome.plans.len());
        }
        Commands::Query {
            refresh,
            filter,
            limit,
            json,
        } => {
            let filter = filter.to_filter()?;
            let outcome = AggregateUseCase::from_config(&config).run(refresh).await;
            let result = QueryUseCase::new(&outcome.plans).query(&filter);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            println!(
                "🔎 {} of {} plans match",
                result.plans.len(),
                result.total_available
            );
            for plan in result.plans.iter().take(limit) {
                println!(
                    "   {} | {} | {} ({}) | ⭐ {:.1} | {} | failures: {}",
                    plan.name,
                    plan.plan_type,
                    plan.state,
                    plan.region,
                    plan.star_rating,
                    plan.organization,
                    plan.cms_failures.len()
                );
            }
            if result.plans.len() > limit {
                println!("   ... {} more", result.plans.len() - limit);
            }
            print_stats(&result.stats);
        }
        Commands::Export {
            refresh,
            output,
            format,
            filter,
        } => {
            let format = parse_format(format.as_deref(), &output)?;
            let filter = filter.to_filter()?;
            let outcome = AggregateUseCase::from_config(&config).run(refresh).await;
            let plans = filter.apply(&outcome.plans);

            println!("💾 Exporting {} plans to {}...", plans.len(), output.display());
            match export_to_path(&plans, &output, format, Uuid::new_v4()) {
                Ok(()) => println!("✅ Export written"),
                Err(e) => {
                    error!("Export failed: {}", e);
                    println!("❌ Export failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::DedupeReport => {
            println!("🔍 Fetching fresh data for duplicate analysis...");
            let outcome = AggregateUseCase::from_config(&config)
                .with_dedupe(true)
                .run(true)
                .await;
            print_outcome(&outcome);

            if outcome.duplicate_groups.is_empty() {
                println!("\n✅ No duplicate plans found");
            } else {
                println!(
                    "\n🧹 {} duplicates in {} groups:",
                    outcome.duplicates_removed,
                    outcome.duplicate_groups.len()
                );
                for group in &outcome.duplicate_groups {
                    println!(
                        "   {} (kept #{}, removed {:?})",
                        group.key, group.original_index, group.duplicate_indices
                    );
                }
            }
        }
        Commands::Cache { action } => match action {
            CacheAction::Clear => {
                let store = Arc::new(FileCacheStore::new(config.cache.dir.clone()));
                PlanCache::new(store, config.cache_ttl()).clear().await?;
                println!("🗑️  Plan cache cleared ({})", config.cache.dir.display());
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_selection_bypasses_cache() {
        assert!(!must_refresh(false, None));
        assert!(must_refresh(true, None));
        assert!(must_refresh(false, Some("sample_data")));
    }

    #[test]
    fn test_run_command_parses_sources() {
        let cli = Cli::try_parse_from(["medplan_aggregator", "run", "--sources", "sample_data"]).unwrap();
        match cli.command {
            Commands::Run { refresh, sources } => {
                assert!(must_refresh(refresh, sources.as_deref()));
            }
            _ => panic!("expected run command"),
        }
    }
}
