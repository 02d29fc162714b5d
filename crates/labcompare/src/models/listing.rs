//! Request/response shapes for submit, list and stats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::comparison::{Comparison, ComparisonStatus};

/// Returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub comparison_id: String,
    pub report_count: usize,
    pub status: ComparisonStatus,
}

/// A comparison as shown in list views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub id: String,
    pub patient_id: String,
    #[serde(default)]
    pub doctor_id: Option<String>,
    pub comparison_name: String,
    pub report_count: usize,
    pub status: ComparisonStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Comparison> for ComparisonSummary {
    fn from(c: &Comparison) -> Self {
        Self {
            id: c.id.clone(),
            patient_id: c.patient_id.clone(),
            doctor_id: c.doctor_id.clone(),
            comparison_name: c.comparison_name.clone(),
            report_count: c.report_count,
            status: c.status,
            created_at: c.created_at,
        }
    }
}

pub const DEFAULT_PAGE_LIMIT: u64 = 20;
pub const MAX_PAGE_LIMIT: u64 = 100;

/// Filters for listing comparisons. Dates bound `created_at` inclusively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ComparisonStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_date: Option<DateTime<Utc>>,
    /// 1-based page number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl ListFilter {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    /// Rows to skip; saturates for absurd page numbers.
    pub fn offset(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(alias = "comparisons")]
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn add(&mut self, status: ComparisonStatus, count: u64) {
        match status {
            ComparisonStatus::Pending => self.pending += count,
            ComparisonStatus::Processing => self.processing += count,
            ComparisonStatus::Completed => self.completed += count,
            ComparisonStatus::Failed => self.failed += count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCount {
    /// Calendar month as `YYYY-MM`.
    pub month: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonStats {
    pub total: u64,
    pub by_status: StatusCounts,
    #[serde(default)]
    pub by_month: Vec<MonthCount>,
}
