//! Scripted in-memory backend for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use super::ComparisonApi;
use crate::error::ApiError;
use crate::models::{
    Comparison, ComparisonStats, ComparisonStatus, ComparisonSummary, ListFilter, Page,
    ProcessingStage, SubmitResponse,
};
use crate::submit::SubmissionRequest;

pub(crate) fn comparison(id: &str, status: ComparisonStatus) -> Comparison {
    let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    Comparison {
        id: id.to_string(),
        patient_id: "P1".to_string(),
        doctor_id: None,
        comparison_name: format!("Comparison {}", id),
        report_count: 2,
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

/// `get` pops scripted responses; once the script runs dry it falls back to
/// `records`.
#[derive(Default)]
pub(crate) struct MockApi {
    script: Mutex<VecDeque<Result<Comparison, ApiError>>>,
    records: Mutex<Vec<Comparison>>,
    submissions: Mutex<Vec<SubmissionRequest>>,
    deleted: Mutex<Vec<String>>,
    fetched: Mutex<Vec<String>>,
    list_calls: AtomicUsize,
}

impl MockApi {
    pub(crate) fn with_script(script: Vec<Result<Comparison, ApiError>>) -> Self {
        let api = Self::default();
        *api.script.lock().unwrap() = script.into();
        api
    }

    pub(crate) fn push(&self, response: Result<Comparison, ApiError>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub(crate) fn insert(&self, record: Comparison) {
        self.records.lock().unwrap().push(record);
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    /// Ids passed to `get`, in call order.
    pub(crate) fn fetched_ids(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn submissions(&self) -> Vec<SubmissionRequest> {
        self.submissions.lock().unwrap().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComparisonApi for MockApi {
    async fn submit(&self, request: SubmissionRequest) -> Result<SubmitResponse, ApiError> {
        let mut submissions = self.submissions.lock().unwrap();
        let id = format!("cmp-{}", submissions.len() + 1);
        let response = SubmitResponse {
            comparison_id: id.clone(),
            report_count: request.report_count(),
            status: ComparisonStatus::Pending,
        };
        let mut record = comparison(&id, ComparisonStatus::Pending);
        record.patient_id = request.patient_id.clone();
        record.report_count = request.report_count();
        self.records.lock().unwrap().push(record);
        submissions.push(request);
        Ok(response)
    }

    async fn get(&self, id: &str) -> Result<Comparison, ApiError> {
        self.fetched.lock().unwrap().push(id.to_string());
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Page<ComparisonSummary>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().unwrap();
        let items: Vec<ComparisonSummary> = records
            .iter()
            .filter(|c| filter.status.is_none_or(|s| c.status == s))
            .map(ComparisonSummary::from)
            .collect();
        Ok(Page {
            total: items.len() as u64,
            items,
            page: filter.page(),
            limit: filter.limit(),
        })
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.records.lock().unwrap().retain(|c| c.id != id);
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn stats(&self) -> Result<ComparisonStats, ApiError> {
        let records = self.records.lock().unwrap();
        let mut stats = ComparisonStats {
            total: records.len() as u64,
            ..ComparisonStats::default()
        };
        for record in records.iter() {
            stats.by_status.add(record.status, 1);
        }
        Ok(stats)
    }
}
