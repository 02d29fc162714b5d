//! Per-report extraction results.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Flag attached to a single lab value by the extraction step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum ResultStatus {
    Normal,
    High,
    Low,
    Abnormal,
    #[default]
    Unknown,
}

impl ResultStatus {
    /// Lenient parse: case-insensitive names plus single-letter lab flags.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "normal" | "n" | "within range" => ResultStatus::Normal,
            "high" | "h" | "elevated" => ResultStatus::High,
            "low" | "l" => ResultStatus::Low,
            "abnormal" | "a" | "critical" => ResultStatus::Abnormal,
            _ => ResultStatus::Unknown,
        }
    }

    /// High, Low and Abnormal flags.
    pub fn is_flagged(&self) -> bool {
        matches!(
            self,
            ResultStatus::High | ResultStatus::Low | ResultStatus::Abnormal
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Normal => "Normal",
            ResultStatus::High => "High",
            ResultStatus::Low => "Low",
            ResultStatus::Abnormal => "Abnormal",
            ResultStatus::Unknown => "Unknown",
        }
    }
}

impl From<String> for ResultStatus {
    fn from(raw: String) -> Self {
        ResultStatus::parse(&raw)
    }
}

/// Any string parses leniently; `null` is `Unknown`.
impl<'de> Deserialize<'de> for ResultStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<String>::deserialize(deserializer)?
            .map(ResultStatus::from)
            .unwrap_or_default())
    }
}

impl From<ResultStatus> for String {
    fn from(status: ResultStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lab values arrive as strings ("13.5", "<0.5", "Positive") or bare numbers.
pub(crate) fn value_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
        Raw::Null(()) => String::new(),
    })
}

/// One measured parameter in one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub parameter: String,
    #[serde(deserialize_with = "value_text")]
    pub value: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub reference_range: Option<String>,
    #[serde(default)]
    pub status: ResultStatus,
}

impl TestResult {
    pub fn new(
        parameter: impl Into<String>,
        value: impl Into<String>,
        unit: Option<&str>,
        reference_range: Option<&str>,
        status: ResultStatus,
    ) -> Self {
        Self {
            parameter: parameter.into(),
            value: value.into(),
            unit: unit.map(str::to_string),
            reference_range: reference_range.map(str::to_string),
            status,
        }
    }
}

/// Output of the per-report analyzer for a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredReport {
    #[serde(default)]
    pub test_name: String,
    /// Collection date printed on the report, when the analyzer found one.
    #[serde(default)]
    pub report_date: Option<NaiveDate>,
    #[serde(default)]
    pub results: Vec<TestResult>,
}

impl StructuredReport {
    /// Attach upload metadata.
    ///
    /// The analysis date is the printed report date at midnight UTC. Undated
    /// reports get `received_at` plus `upload_order` seconds so they keep
    /// their upload order when sorted.
    pub fn into_report(
        self,
        file_name: &str,
        file_type: &str,
        upload_order: usize,
        received_at: DateTime<Utc>,
    ) -> Report {
        let analysis_date = match self.report_date {
            Some(date) => date.and_time(NaiveTime::MIN).and_utc(),
            None => received_at + Duration::seconds(upload_order as i64),
        };
        Report {
            file_name: file_name.to_string(),
            file_type: file_type.to_string(),
            upload_order,
            analysis_date,
            test_name: self.test_name,
            test_results: self.results,
        }
    }
}

/// One uploaded document with its extracted results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub file_name: String,
    #[serde(default)]
    pub file_type: String,
    /// Position in the original upload (0-based).
    #[serde(default)]
    pub upload_order: usize,
    pub analysis_date: DateTime<Utc>,
    #[serde(default)]
    pub test_name: String,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
}
