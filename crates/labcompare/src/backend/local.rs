//! SQLite-backed implementation of [`ComparisonApi`].
//!
//! `submit` stores a pending record and processes it on a spawned task, so
//! callers observe the same pending → processing → completed/failed lifecycle
//! the HTTP service exposes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::analysis::{compare_reports, order_reports, TrendPolicy};
use crate::api::ComparisonApi;
use crate::db::{comparison_repo, stats_repo, Database, DatabaseError};
use crate::error::ApiError;
use crate::extract::ReportAnalyzer;
use crate::models::{
    Comparison, ComparisonStats, ComparisonStatus, ComparisonSummary, DateRange, ListFilter, Page,
    ProcessingStage, SubmitResponse, UploadedFile,
};
use crate::submit::{SubmissionRequest, UploadFile};

pub struct LocalBackend {
    db: Database,
    analyzer: Arc<dyn ReportAnalyzer>,
    policy: TrendPolicy,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl LocalBackend {
    pub fn new(db: Database, analyzer: Arc<dyn ReportAnalyzer>, policy: TrendPolicy) -> Self {
        Self {
            db,
            analyzer,
            policy,
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Wait for every job submitted so far to finish processing.
    pub async fn wait_idle(&self) {
        let workers: Vec<_> = {
            let mut slot = self
                .workers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.drain(..).collect()
        };
        for worker in workers {
            if let Err(e) = worker.await {
                log::error!("Comparison worker panicked: {}", e);
            }
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut slot = self
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.retain(|h| !h.is_finished());
        slot.push(handle);
    }
}

#[async_trait]
impl ComparisonApi for LocalBackend {
    async fn submit(&self, request: SubmissionRequest) -> Result<SubmitResponse, ApiError> {
        let now = Utc::now();
        let comparison = Comparison {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: request.patient_id.clone(),
            doctor_id: request.doctor_id.clone(),
            comparison_name: request.comparison_name.clone(),
            report_count: request.report_count(),
            date_range: None,
            uploaded_files: request
                .files
                .iter()
                .map(|f| UploadedFile {
                    file_name: f.file_name.clone(),
                    file_type: f.mime_type.clone(),
                    file_size: f.size(),
                })
                .collect(),
            custom_prompt: request.custom_prompt.clone(),
            individual_analyses: Vec::new(),
            parameter_comparisons: Vec::new(),
            comparison_analysis: None,
            status: ComparisonStatus::Pending,
            processing_stage: ProcessingStage::Queued,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        comparison_repo::insert(&self.db, &comparison)?;
        log::info!(
            "Stored comparison {} for patient {} ({} reports)",
            comparison.id,
            comparison.patient_id,
            comparison.report_count
        );

        let response = SubmitResponse {
            comparison_id: comparison.id.clone(),
            report_count: comparison.report_count,
            status: comparison.status,
        };

        let job = ComparisonJob {
            db: self.db.clone(),
            analyzer: Arc::clone(&self.analyzer),
            policy: self.policy,
        };
        let span = tracing::info_span!(
            "comparison_job",
            comparison_id = %comparison.id,
            reports = comparison.report_count
        );
        self.track(tokio::spawn(
            job.run(comparison, request.files).instrument(span),
        ));

        Ok(response)
    }

    async fn get(&self, id: &str) -> Result<Comparison, ApiError> {
        comparison_repo::find_by_id(&self.db, id)?.ok_or_else(|| ApiError::NotFound(id.to_string()))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Page<ComparisonSummary>, ApiError> {
        let (rows, total) = comparison_repo::query(&self.db, filter)?;
        Ok(Page {
            items: rows.iter().map(ComparisonSummary::from).collect(),
            total,
            page: filter.page(),
            limit: filter.limit(),
        })
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        if comparison_repo::delete(&self.db, id)? {
            log::info!("Deleted comparison {}", id);
        } else {
            log::debug!("Delete of unknown comparison {} ignored", id);
        }
        Ok(())
    }

    async fn stats(&self) -> Result<ComparisonStats, ApiError> {
        Ok(stats_repo::summary(&self.db)?)
    }
}

/// Background processing for one stored comparison.
struct ComparisonJob {
    db: Database,
    analyzer: Arc<dyn ReportAnalyzer>,
    policy: TrendPolicy,
}

impl ComparisonJob {
    async fn run(self, mut comparison: Comparison, files: Vec<UploadFile>) {
        let Err(e) = self.process(&mut comparison, files).await else {
            return;
        };
        log::error!("Comparison {} could not be saved: {}", comparison.id, e);

        // Leave a terminal record behind so pollers stop waiting on it.
        comparison.individual_analyses.clear();
        comparison.parameter_comparisons.clear();
        comparison.comparison_analysis = None;
        comparison.date_range = None;
        let message = format!("Could not save comparison results: {}", e);
        if let Err(e) = self.fail(&mut comparison, message) {
            log::error!("Comparison {} is stuck in {}: {}", comparison.id, comparison.status, e);
        }
    }

    async fn process(
        &self,
        comparison: &mut Comparison,
        files: Vec<UploadFile>,
    ) -> Result<(), DatabaseError> {
        if !self.advance(comparison, ProcessingStage::AnalyzingReports)? {
            return Ok(());
        }

        let mut reports = Vec::with_capacity(files.len());
        for (order, file) in files.iter().enumerate() {
            let extracted = match self.analyzer.extract(file).await {
                Ok(extracted) => extracted,
                Err(e) => {
                    log::warn!("Comparison {} failed on {}: {}", comparison.id, file.file_name, e);
                    return self.fail(comparison, e.to_string());
                }
            };
            reports.push(extracted.into_report(
                &file.file_name,
                &file.mime_type,
                order,
                comparison.created_at,
            ));
        }
        order_reports(&mut reports);

        if !self.advance(comparison, ProcessingStage::ComparingReports)? {
            return Ok(());
        }

        let (parameter_comparisons, analysis) = compare_reports(&reports, &self.policy);
        comparison.date_range = DateRange::from_reports(&reports);
        comparison.individual_analyses = reports;
        comparison.parameter_comparisons = parameter_comparisons;
        comparison.comparison_analysis = Some(analysis);
        comparison.status = ComparisonStatus::Completed;
        comparison.processing_stage = ProcessingStage::Completed;
        comparison.updated_at = Utc::now();
        comparison_repo::update(&self.db, comparison)?;

        log::info!(
            "Comparison {} completed: {} parameters across {} reports",
            comparison.id,
            comparison.parameter_comparisons.len(),
            comparison.individual_analyses.len()
        );
        Ok(())
    }

    /// Persist a new stage. False when the record was deleted meanwhile.
    fn advance(
        &self,
        comparison: &mut Comparison,
        stage: ProcessingStage,
    ) -> Result<bool, DatabaseError> {
        comparison.status = ComparisonStatus::Processing;
        comparison.processing_stage = stage;
        comparison.updated_at = Utc::now();
        let found = comparison_repo::update(&self.db, comparison)?;
        if found {
            log::debug!("Comparison {}: {}", comparison.id, stage);
        } else {
            log::info!("Comparison {} was deleted, stopping", comparison.id);
        }
        Ok(found)
    }

    fn fail(&self, comparison: &mut Comparison, message: String) -> Result<(), DatabaseError> {
        comparison.status = ComparisonStatus::Failed;
        comparison.processing_stage = ProcessingStage::Failed;
        comparison.error_message = Some(message);
        comparison.updated_at = Utc::now();
        comparison_repo::update(&self.db, comparison)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FixtureAnalyzer;
    use crate::models::{Priority, ResultStatus, StructuredReport, TestResult, Trend};
    use crate::submit::UploadLimits;
    use chrono::NaiveDate;

    fn pdf(name: &str) -> UploadFile {
        UploadFile::new(name, "application/pdf", b"%PDF-1.4".to_vec())
    }

    fn glucose(date: Option<NaiveDate>, value: &str) -> StructuredReport {
        StructuredReport {
            test_name: "Metabolic panel".to_string(),
            report_date: date,
            results: vec![TestResult::new(
                "Glucose",
                value,
                Some("mg/dL"),
                Some("70-99"),
                ResultStatus::Normal,
            )],
        }
    }

    fn request(names: &[&str]) -> SubmissionRequest {
        SubmissionRequest::new(
            names.iter().map(|n| pdf(n)).collect(),
            "P1",
            Some("Glucose follow-up"),
            None,
            &UploadLimits::default(),
            NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        )
        .unwrap()
    }

    fn backend(analyzer: FixtureAnalyzer) -> LocalBackend {
        LocalBackend::new(
            Database::open_in_memory().unwrap(),
            Arc::new(analyzer),
            TrendPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_submit_then_complete() {
        let jun = NaiveDate::from_ymd_opt(2026, 6, 1);
        let jan = NaiveDate::from_ymd_opt(2026, 1, 1);
        let analyzer = FixtureAnalyzer::new()
            // Uploaded newest first; processing reorders by report date.
            .with_report("jun.pdf", glucose(jun, "130"))
            .with_report("jan.pdf", glucose(jan, "90"));
        let backend = backend(analyzer);

        let response = backend.submit(request(&["jun.pdf", "jan.pdf"])).await.unwrap();
        assert_eq!(response.status, ComparisonStatus::Pending);
        assert_eq!(response.report_count, 2);

        backend.wait_idle().await;
        let done = backend.get(&response.comparison_id).await.unwrap();
        assert_eq!(done.status, ComparisonStatus::Completed);
        assert_eq!(done.processing_stage, ProcessingStage::Completed);
        assert_eq!(done.individual_analyses[0].file_name, "jan.pdf");
        assert_eq!(done.individual_analyses[0].upload_order, 1);
        assert_eq!(done.parameter_comparisons[0].trend, Trend::Increasing);

        let range = done.date_range.unwrap();
        assert_eq!(range.start.date_naive(), jan.unwrap());
        assert_eq!(range.end.date_naive(), jun.unwrap());
        assert_eq!(done.uploaded_files[0].file_name, "jun.pdf");
        assert_eq!(done.uploaded_files[0].file_size, 8);
    }

    #[tokio::test]
    async fn test_undated_reports_keep_upload_order() {
        let analyzer = FixtureAnalyzer::new()
            .with_report("first.pdf", glucose(None, "140"))
            .with_report("second.pdf", glucose(None, "100"));
        let backend = backend(analyzer);

        let id = backend
            .submit(request(&["first.pdf", "second.pdf"]))
            .await
            .unwrap()
            .comparison_id;
        backend.wait_idle().await;

        let done = backend.get(&id).await.unwrap();
        let names: Vec<_> = done
            .individual_analyses
            .iter()
            .map(|r| r.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["first.pdf", "second.pdf"]);
        assert_eq!(done.parameter_comparisons[0].trend, Trend::Decreasing);
        // Both values are flagged normal, so nothing warrants a high priority.
        assert_ne!(
            done.comparison_analysis.unwrap().highest_priority(),
            Some(Priority::High)
        );
    }

    #[tokio::test]
    async fn test_analyzer_failure_marks_job_failed() {
        let analyzer = FixtureAnalyzer::new().with_report("a.pdf", glucose(None, "90"));
        let backend = backend(analyzer);

        let id = backend
            .submit(request(&["a.pdf", "missing.pdf"]))
            .await
            .unwrap()
            .comparison_id;
        backend.wait_idle().await;

        let failed = backend.get(&id).await.unwrap();
        assert_eq!(failed.status, ComparisonStatus::Failed);
        assert_eq!(failed.processing_stage, ProcessingStage::Failed);
        assert_eq!(
            failed.error_message.as_deref(),
            Some("No structured report available for 'missing.pdf'")
        );
        assert!(failed.comparison_analysis.is_none());
    }

    #[tokio::test]
    async fn test_save_error_marks_job_failed() {
        let analyzer = FixtureAnalyzer::new()
            .with_report("a.pdf", glucose(None, "90"))
            .with_report("b.pdf", glucose(None, "92"));
        let backend = backend(analyzer);
        backend
            .database()
            .with_conn(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_completed BEFORE UPDATE ON comparisons
                     WHEN NEW.status = 'completed'
                     BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
                )?;
                Ok(())
            })
            .unwrap();

        let id = backend
            .submit(request(&["a.pdf", "b.pdf"]))
            .await
            .unwrap()
            .comparison_id;
        backend.wait_idle().await;

        let failed = backend.get(&id).await.unwrap();
        assert_eq!(failed.status, ComparisonStatus::Failed);
        assert_eq!(failed.processing_stage, ProcessingStage::Failed);
        let message = failed.error_message.unwrap();
        assert!(message.starts_with("Could not save comparison results"));
        assert!(message.contains("disk full"));
        assert!(failed.parameter_comparisons.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let err = backend(FixtureAnalyzer::new()).get("nope").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_list_delete_and_stats() {
        let analyzer = FixtureAnalyzer::new()
            .with_report("a.pdf", glucose(None, "90"))
            .with_report("b.pdf", glucose(None, "92"));
        let backend = backend(analyzer);

        let first = backend.submit(request(&["a.pdf", "b.pdf"])).await.unwrap();
        let second = backend.submit(request(&["a.pdf", "b.pdf"])).await.unwrap();
        backend.wait_idle().await;

        let page = backend.list(&ListFilter::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.page, 1);
        assert_eq!(page.items.len(), 2);

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status.completed, 2);

        backend.delete(&first.comparison_id).await.unwrap();
        // Deleting again is not an error.
        backend.delete(&first.comparison_id).await.unwrap();

        let page = backend.list(&ListFilter::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, second.comparison_id);
    }
}
