//! The comparison job record and its analysis payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::report::{value_text, Report, ResultStatus};

/// Server-side lifecycle of a comparison job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ComparisonStatus {
    /// Completed and Failed are final; the server never leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ComparisonStatus::Completed | ComparisonStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonStatus::Pending => "pending",
            ComparisonStatus::Processing => "processing",
            ComparisonStatus::Completed => "completed",
            ComparisonStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ComparisonStatus::Pending),
            "processing" => Some(ComparisonStatus::Processing),
            "completed" => Some(ComparisonStatus::Completed),
            "failed" => Some(ComparisonStatus::Failed),
            _ => None,
        }
    }

    pub const ALL: [ComparisonStatus; 4] = [
        ComparisonStatus::Pending,
        ComparisonStatus::Processing,
        ComparisonStatus::Completed,
        ComparisonStatus::Failed,
    ];
}

impl std::fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finer-grained progress marker within `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Queued,
    AnalyzingReports,
    ComparingReports,
    Completed,
    Failed,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Queued => write!(f, "Queued"),
            ProcessingStage::AnalyzingReports => write!(f, "Analyzing reports"),
            ProcessingStage::ComparingReports => write!(f, "Comparing reports"),
            ProcessingStage::Completed => write!(f, "Completed"),
            ProcessingStage::Failed => write!(f, "Failed"),
        }
    }
}

/// Direction of a parameter across report dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    Fluctuating,
    InsufficientData,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
            Trend::Fluctuating => "fluctuating",
            Trend::InsufficientData => "insufficient_data",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One report's reading of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePoint {
    /// Index into the date-ordered `individual_analyses`.
    pub report_index: usize,
    pub date: DateTime<Utc>,
    #[serde(deserialize_with = "value_text")]
    pub value: String,
    #[serde(default)]
    pub status: ResultStatus,
    pub file_name: String,
}

/// A single parameter aligned across every report that contains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterComparison {
    /// Display name, as written in the first report containing the parameter.
    pub parameter: String,
    /// Normalized alignment key.
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub reference_range: Option<String>,
    pub values: Vec<ValuePoint>,
    pub trend: Trend,
    #[serde(default)]
    pub trend_analysis: String,
    #[serde(default)]
    pub is_concerning: bool,
    #[serde(default)]
    pub clinical_significance: Option<String>,
}

impl ParameterComparison {
    /// The most recent reading, by report date.
    pub fn latest(&self) -> Option<&ValuePoint> {
        self.values.last()
    }

    pub fn latest_status(&self) -> ResultStatus {
        self.latest().map(|v| v.status).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn timeline(&self) -> &'static str {
        match self {
            Priority::High => "within 1 week",
            Priority::Medium => "within 1 month",
            Priority::Low => "at next routine visit",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: String,
    pub action: String,
    pub priority: Priority,
    pub timeline: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub overall_status: String,
    #[serde(default)]
    pub main_findings: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonAnalysis {
    pub overall_trend: String,
    #[serde(default)]
    pub key_changes: Vec<String>,
    #[serde(default)]
    pub concerning_parameters: Vec<String>,
    #[serde(default)]
    pub improved_parameters: Vec<String>,
    #[serde(default)]
    pub stable_parameters: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub patient_summary: PatientSummary,
}

impl ComparisonAnalysis {
    /// Highest priority across all recommendations.
    pub fn highest_priority(&self) -> Option<Priority> {
        self.recommendations.iter().map(|r| r.priority).max()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Spans the earliest and latest report dates; `None` without reports.
    pub fn from_reports(reports: &[Report]) -> Option<Self> {
        let start = reports.iter().map(|r| r.analysis_date).min()?;
        let end = reports.iter().map(|r| r.analysis_date).max()?;
        Some(Self { start, end })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file_name: String,
    pub file_type: String,
    #[serde(default)]
    pub file_size: u64,
}

/// A comparison job as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub id: String,
    pub patient_id: String,
    #[serde(default)]
    pub doctor_id: Option<String>,
    pub comparison_name: String,
    pub report_count: usize,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub uploaded_files: Vec<UploadedFile>,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub individual_analyses: Vec<Report>,
    #[serde(default)]
    pub parameter_comparisons: Vec<ParameterComparison>,
    #[serde(default)]
    pub comparison_analysis: Option<ComparisonAnalysis>,
    pub status: ComparisonStatus,
    #[serde(default = "default_stage")]
    pub processing_stage: ProcessingStage,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_stage() -> ProcessingStage {
    ProcessingStage::Queued
}

impl Comparison {
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
