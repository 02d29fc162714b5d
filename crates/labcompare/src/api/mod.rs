//! Backend interface for comparison jobs.

mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use http::HttpComparisonApi;
#[cfg(test)]
pub(crate) use mock::MockApi;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::{
    Comparison, ComparisonStats, ComparisonSummary, ListFilter, Page, SubmitResponse,
};
use crate::submit::SubmissionRequest;

/// Operations a comparison backend provides.
///
/// Implemented by the HTTP client and by the local SQLite backend.
#[async_trait]
pub trait ComparisonApi: Send + Sync {
    /// Create a job. The returned status is `pending`.
    async fn submit(&self, request: SubmissionRequest) -> Result<SubmitResponse, ApiError>;

    /// Fetch the full record, including results once completed.
    async fn get(&self, id: &str) -> Result<Comparison, ApiError>;

    async fn list(&self, filter: &ListFilter) -> Result<Page<ComparisonSummary>, ApiError>;

    /// Remove a job. Deleting an unknown id succeeds.
    async fn delete(&self, id: &str) -> Result<(), ApiError>;

    async fn stats(&self) -> Result<ComparisonStats, ApiError>;
}
