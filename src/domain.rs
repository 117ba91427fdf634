use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Program a plan belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Medicare,
    Medicaid,
}

impl PlanType {
    /// Declared plan-type text containing "medicaid" (any case) is Medicaid,
    /// everything else is Medicare.
    pub fn from_declared(text: &str) -> Self {
        if text.to_lowercase().contains("medicaid") {
            PlanType::Medicaid
        } else {
            PlanType::Medicare
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Medicare => "medicare",
            PlanType::Medicaid => "medicaid",
        }
    }

    pub fn all() -> [PlanType; 2] {
        [PlanType::Medicare, PlanType::Medicaid]
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic bucket derived from a plan's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    Northeast,
    Midwest,
    Southeast,
    Southwest,
    West,
    Other,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Northeast => "Northeast",
            Region::Midwest => "Midwest",
            Region::Southeast => "Southeast",
            Region::Southwest => "Southwest",
            Region::West => "West",
            Region::Other => "Other",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "northeast" => Ok(Region::Northeast),
            "midwest" => Ok(Region::Midwest),
            "southeast" | "south" => Ok(Region::Southeast),
            "southwest" => Ok(Region::Southwest),
            "west" => Ok(Region::West),
            "other" => Ok(Region::Other),
            other => Err(format!("unknown region: {other}")),
        }
    }
}

/// Impact of a failed CMS criterion, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Tolerance so that gaps landing on a tenth boundary (0.5, 1.0) classify
/// upward even when the subtraction lands a hair below it.
const SEVERITY_TOLERANCE: f64 = 1e-9;

impl Severity {
    /// Classify the gap between a target and an actual score.
    ///
    /// `>= 1.0` Critical, `>= 0.5` High, `>= 0.2` Medium, otherwise Low.
    pub fn classify(target: f64, actual: f64) -> Self {
        let gap = target - actual + SEVERITY_TOLERANCE;
        if gap >= 1.0 {
            Severity::Critical
        } else if gap >= 0.5 {
            Severity::High
        } else if gap >= 0.2 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }

    pub fn all() -> [Severity; 4] {
        [Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// NCQA accreditation level, ordinal from worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NcqaLevel {
    Denied,
    Provisional,
    Accredited,
    Commendable,
    Excellent,
}

impl NcqaLevel {
    pub const LEVELS: [NcqaLevel; 5] = [
        NcqaLevel::Denied,
        NcqaLevel::Provisional,
        NcqaLevel::Accredited,
        NcqaLevel::Commendable,
        NcqaLevel::Excellent,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Level at `index`, clamped into the ordinal bounds
    pub fn from_index(index: i64) -> Self {
        let clamped = index.clamp(0, (Self::LEVELS.len() - 1) as i64) as usize;
        Self::LEVELS[clamped]
    }

    pub fn score(&self) -> u8 {
        ((self.index() + 1) * 20) as u8
    }

    pub fn description(&self) -> &'static str {
        match self {
            NcqaLevel::Denied => "Accreditation denied; plan did not meet NCQA standards",
            NcqaLevel::Provisional => "Provisional accreditation; improvement plan required",
            NcqaLevel::Accredited => "Accredited; meets basic NCQA quality requirements",
            NcqaLevel::Commendable => "Commendable; well-established quality improvement programs",
            NcqaLevel::Excellent => "Excellent; highest level of NCQA accreditation",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NcqaLevel::Denied => "Denied",
            NcqaLevel::Provisional => "Provisional",
            NcqaLevel::Accredited => "Accredited",
            NcqaLevel::Commendable => "Commendable",
            NcqaLevel::Excellent => "Excellent",
        }
    }
}

impl fmt::Display for NcqaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NcqaRating {
    pub level: NcqaLevel,
    pub score: u8,
    pub year: i32,
    pub description: String,
}

/// A CMS criterion where the plan's actual score fell short of its target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmsFailure {
    pub criterion: String,
    pub target: f64,
    pub actual: f64,
    pub impact: Severity,
    pub description: String,
    pub recommendations: Vec<String>,
}

impl CmsFailure {
    /// Severity recomputed from the stored scores
    pub fn severity(&self) -> Severity {
        Severity::classify(self.target, self.actual)
    }
}

/// Canonical, normalized plan record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub plan_type: PlanType,
    pub state: String,
    pub region: Region,
    pub organization: String,
    pub star_rating: f64,
    #[serde(default)]
    pub star_rating_synthesized: bool,
    pub ncqa_rating: NcqaRating,
    pub members: u64,
    pub cms_criteria: BTreeMap<String, f64>,
    pub cms_failures: Vec<CmsFailure>,
    pub contract_id: String,
    pub county: String,
    pub zip_code: String,
    pub phone: String,
    pub website: String,
    pub source: String,
    pub last_updated: NaiveDate,
}

impl Plan {
    pub fn has_failures(&self) -> bool {
        !self.cms_failures.is_empty()
    }

    /// Worst severity among the plan's failures
    pub fn highest_severity(&self) -> Option<Severity> {
        self.cms_failures.iter().map(CmsFailure::severity).max()
    }
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
