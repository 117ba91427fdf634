/// Source name constants to ensure consistency across the codebase.
/// These are the provenance labels written into `Plan::source` and the names
/// accepted by the CLI `--sources` flag.

pub const MEDICARE_API: &str = "medicare_api";
pub const MEDICAID_API: &str = "medicaid_api";
pub const SAMPLE_DATA: &str = "sample_data";
pub const JSON_FILE: &str = "json_file";
pub const CACHE_SOURCE: &str = "cache";

// Defaults written by the normalizer when a field cannot be resolved
pub const UNKNOWN_PLAN: &str = "Unknown Plan";
pub const UNKNOWN_STATE: &str = "Unknown";
pub const UNKNOWN_ORGANIZATION: &str = "Unknown Organization";
pub const NOT_AVAILABLE: &str = "Not Available";
pub const OTHER_REGION: &str = "Other";

/// Key under which the merged plan list is cached
pub const PLAN_CACHE_KEY: &str = "medplan_aggregated_plans_v1";
pub const DEFAULT_CACHE_TTL_DAYS: i64 = 7;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 12;

/// Organizations whose NCQA accreditation is nudged upward
pub const HIGH_QUALITY_ORGANIZATIONS: &[&str] = &[
    "kaiser",
    "humana",
    "unitedhealthcare",
    "blue cross",
    "blue shield",
    "aetna",
    "cigna",
    "centene",
];

/// Canonical CMS quality dimensions, in display order
pub const CMS_CRITERIA: &[&str] = &[
    "Staying Healthy",
    "Managing Chronic Conditions",
    "Member Experience",
    "Member Complaints",
    "Customer Service",
    "Drug Safety",
    "Drug Pricing Accuracy",
    "Care Coordination",
    "Preventive Screenings",
    "Medication Adherence",
    "Access to Care",
    "Plan Responsiveness",
];

/// Get all source names that can be selected from the CLI
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![MEDICARE_API, MEDICAID_API, SAMPLE_DATA, JSON_FILE]
}
