//! CSV and JSON artifacts for a plan list.

use chrono::{DateTime, Utc};
use csv::Writer;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::domain::Plan;
use crate::error::Result;
use crate::metrics::{emit_counter, MetricName};

/// CSV header, in column order
pub const CSV_COLUMNS: [&str; 19] = [
    "id",
    "name",
    "type",
    "state",
    "region",
    "organization",
    "starRating",
    "ncqaLevel",
    "ncqaScore",
    "members",
    "contractId",
    "county",
    "zipCode",
    "phone",
    "website",
    "failureCount",
    "highestSeverity",
    "source",
    "lastUpdated",
];

fn csv_row(plan: &Plan) -> [String; 19] {
    [
        plan.id.clone(),
        plan.name.clone(),
        plan.plan_type.as_str().to_string(),
        plan.state.clone(),
        plan.region.as_str().to_string(),
        plan.organization.clone(),
        format!("{:.1}", plan.star_rating),
        plan.ncqa_rating.level.as_str().to_string(),
        plan.ncqa_rating.score.to_string(),
        plan.members.to_string(),
        plan.contract_id.clone(),
        plan.county.clone(),
        plan.zip_code.clone(),
        plan.phone.clone(),
        plan.website.clone(),
        plan.cms_failures.len().to_string(),
        plan.highest_severity()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        plan.source.clone(),
        plan.last_updated.format("%Y-%m-%d").to_string(),
    ]
}

/// Write a header row plus one row per plan
pub fn write_csv<W: Write>(plans: &[Plan], out: W) -> Result<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(CSV_COLUMNS)?;
    for plan in plans {
        writer.write_record(csv_row(plan))?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub record_count: usize,
    pub generated_at: DateTime<Utc>,
    /// Distinct plan sources in first-seen order
    pub sources: Vec<String>,
    pub run_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonExport {
    pub metadata: ExportMetadata,
    pub plans: Vec<Plan>,
}

impl JsonExport {
    pub fn new(plans: &[Plan], run_id: Uuid, generated_at: DateTime<Utc>) -> Self {
        let mut sources: Vec<String> = Vec::new();
        for plan in plans {
            if !sources.contains(&plan.source) {
                sources.push(plan.source.clone());
            }
        }
        Self {
            metadata: ExportMetadata {
                record_count: plans.len(),
                generated_at,
                sources,
                run_id,
            },
            plans: plans.to_vec(),
        }
    }
}

pub fn write_json<W: Write>(export: &JsonExport, out: W) -> Result<()> {
    serde_json::to_writer_pretty(out, export)?;
    Ok(())
}

/// Output format, chosen from a file extension or flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

/// Write `plans` to `path`, creating parent directories as needed.
pub fn export_to_path(plans: &[Plan], path: &Path, format: ExportFormat, run_id: Uuid) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    match format {
        ExportFormat::Csv => write_csv(plans, file)?,
        ExportFormat::Json => write_json(&JsonExport::new(plans, run_id, Utc::now()), file)?,
    }
    emit_counter(MetricName::ExportRecordsWritten, plans.len() as u64);
    info!("Exported {} plans to {}", plans.len(), path.display());
    Ok(())
}
