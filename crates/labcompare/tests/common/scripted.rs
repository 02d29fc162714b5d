//! Backend double with scripted `get` responses.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use labcompare::models::{
    Comparison, ComparisonStats, ComparisonStatus, ComparisonSummary, ListFilter, Page,
    ProcessingStage, SubmitResponse,
};
use labcompare::{ApiError, ComparisonApi, SubmissionRequest};

pub fn comparison(id: &str, status: ComparisonStatus) -> Comparison {
    let created = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
    Comparison {
        id: id.to_string(),
        patient_id: "P1".to_string(),
        doctor_id: None,
        comparison_name: "Test Comparison - 2026-10-16".to_string(),
        report_count: 3,
        date_range: None,
        uploaded_files: Vec::new(),
        custom_prompt: None,
        individual_analyses: Vec::new(),
        parameter_comparisons: Vec::new(),
        comparison_analysis: None,
        status,
        processing_stage: ProcessingStage::Queued,
        error_message: None,
        created_at: created,
        updated_at: created,
    }
}

/// Answers `get` from the script; the last entry repeats once the rest is used.
pub struct ScriptedApi {
    script: Mutex<VecDeque<Result<Comparison, ApiError>>>,
    last: Mutex<Option<Comparison>>,
    fetches: Mutex<usize>,
}

impl ScriptedApi {
    pub fn new(script: Vec<Result<Comparison, ApiError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            fetches: Mutex::new(0),
        }
    }

    /// Returns `status` for every fetch.
    pub fn always(id: &str, status: ComparisonStatus) -> Self {
        Self::new(vec![Ok(comparison(id, status))])
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl ComparisonApi for ScriptedApi {
    async fn submit(&self, request: SubmissionRequest) -> Result<SubmitResponse, ApiError> {
        Ok(SubmitResponse {
            comparison_id: "cmp-1".to_string(),
            report_count: request.report_count(),
            status: ComparisonStatus::Pending,
        })
    }

    async fn get(&self, id: &str) -> Result<Comparison, ApiError> {
        *self.fetches.lock().unwrap() += 1;
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(comparison)) => {
                *self.last.lock().unwrap() = Some(comparison.clone());
                Ok(comparison)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ApiError::NotFound(id.to_string())),
        }
    }

    async fn list(&self, filter: &ListFilter) -> Result<Page<ComparisonSummary>, ApiError> {
        Ok(Page {
            items: Vec::new(),
            total: 0,
            page: filter.page(),
            limit: filter.limit(),
        })
    }

    async fn delete(&self, _id: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn stats(&self) -> Result<ComparisonStats, ApiError> {
        Ok(ComparisonStats::default())
    }
}
