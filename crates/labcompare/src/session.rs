//! Client session: submit, track, browse and delete comparisons.
//!
//! A session owns one [`JobPoller`], so at most one job is tracked at a time.
//! Tracking a new job replaces the previous one.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};

use crate::api::ComparisonApi;
use crate::config::Config;
use crate::error::Result;
use crate::models::{
    Comparison, ComparisonStats, ComparisonSummary, ListFilter, Page, SubmitResponse,
};
use crate::poller::{JobPoller, PollEvent, PollerConfig};
use crate::store::ComparisonStore;
use crate::submit::{Submitter, UploadFile, UploadLimits};

/// Event subscription for one tracked job.
///
/// Events are buffered until the watch is passed to [`ComparisonSession::wait`].
#[must_use = "completion only reaches the store through ComparisonSession::wait"]
pub struct JobWatch {
    job_id: String,
    events: broadcast::Receiver<PollEvent>,
}

impl JobWatch {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

pub struct ComparisonSession {
    api: Arc<dyn ComparisonApi>,
    submitter: Submitter,
    poller: JobPoller,
    store: ComparisonStore,
}

impl ComparisonSession {
    pub fn new(api: Arc<dyn ComparisonApi>, limits: UploadLimits, poller: PollerConfig) -> Self {
        Self {
            submitter: Submitter::new(Arc::clone(&api), limits),
            poller: JobPoller::new(Arc::clone(&api), poller),
            store: ComparisonStore::new(),
            api,
        }
    }

    pub fn from_config(api: Arc<dyn ComparisonApi>, config: &Config) -> Self {
        Self::new(api, config.upload_limits(), config.poller_config())
    }

    pub fn store(&self) -> &ComparisonStore {
        &self.store
    }

    pub fn poller(&self) -> &JobPoller {
        &self.poller
    }

    /// Validate, submit, and start tracking the new job.
    pub async fn submit(
        &self,
        files: Vec<UploadFile>,
        patient_id: &str,
        comparison_name: Option<&str>,
        custom_prompt: Option<&str>,
    ) -> Result<(SubmitResponse, JobWatch)> {
        let response = self
            .submitter
            .submit(files, patient_id, comparison_name, custom_prompt)
            .await?;
        let watch = self.track(&response.comparison_id);
        Ok((response, watch))
    }

    /// Start polling an existing job.
    ///
    /// The poller runs on its own, but the store is only updated (current
    /// result set, list refreshed) while the returned watch is driven by
    /// [`wait`](Self::wait). Dropping the watch leaves the store untouched.
    pub fn track(&self, job_id: &str) -> JobWatch {
        // Subscribe first so the first poll outcome cannot be missed.
        let events = self.poller.subscribe();
        self.poller.start(job_id);
        JobWatch {
            job_id: job_id.to_string(),
            events,
        }
    }

    /// Follow a tracked job to its terminal event.
    ///
    /// Progress events are logged; a completed result becomes the current
    /// result and the list is refreshed. Returns `None` if the poller went
    /// away before the job settled.
    pub async fn wait(&self, mut watch: JobWatch) -> Option<PollEvent> {
        loop {
            let event = match watch.events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Missed {} poll events for {}", skipped, watch.job_id);
                    continue;
                }
                Err(RecvError::Closed) => return None,
            };
            if event.job_id() != watch.job_id {
                continue;
            }
            self.handle_event(&event).await;
            if event.is_terminal() {
                return Some(event);
            }
        }
    }

    async fn handle_event(&self, event: &PollEvent) {
        match event {
            PollEvent::Progress {
                job_id,
                status,
                progress,
                attempts,
            } => match status {
                Some(status) => log::debug!(
                    "Comparison {} is {} ({}%, attempt {})",
                    job_id,
                    status,
                    progress,
                    attempts
                ),
                None => log::debug!("Comparison {} fetch failed (attempt {})", job_id, attempts),
            },
            PollEvent::Completed { job_id, comparison } => {
                log::info!("Comparison {} completed", job_id);
                self.store.set_current(comparison.as_ref().clone());
                if let Err(e) = self.refresh_list().await {
                    log::warn!("Could not refresh comparison list: {}", e);
                }
            }
            PollEvent::Failed {
                job_id,
                error_message,
            } => log::warn!(
                "Comparison {} failed: {}",
                job_id,
                error_message.as_deref().unwrap_or("no error message")
            ),
            PollEvent::TimedOut { job_id, attempts } => log::warn!(
                "Gave up waiting for comparison {} after {} attempts; it may still finish",
                job_id,
                attempts
            ),
            PollEvent::Cancelled { job_id } => {
                log::info!("Stopped tracking comparison {}", job_id)
            }
        }
    }

    /// Fetch a page with `filter` and cache it.
    pub async fn list(&self, filter: ListFilter) -> Result<Page<ComparisonSummary>> {
        let page = self.api.list(&filter).await?;
        self.store.set_page(filter, page.clone());
        Ok(page)
    }

    /// Re-fetch using the last filter.
    pub async fn refresh_list(&self) -> Result<Page<ComparisonSummary>> {
        self.list(self.store.filter()).await
    }

    /// Load a comparison and make it the current result.
    pub async fn open(&self, id: &str) -> Result<Comparison> {
        let comparison = self.api.get(id).await?;
        self.store.set_current(comparison.clone());
        Ok(comparison)
    }

    /// Delete a comparison, stop tracking it, and drop it from the store.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.api.delete(id).await?;
        if self.poller.job_id().as_deref() == Some(id) {
            self.poller.cancel();
        }
        self.store.remove(id);
        log::info!("Comparison {} deleted", id);
        Ok(())
    }

    pub async fn stats(&self) -> Result<ComparisonStats> {
        Ok(self.api.stats().await?)
    }

    /// Stop any polling. Safe to call repeatedly.
    pub fn teardown(&self) {
        self.poller.cancel();
    }
}
