//! Data model shared by the client, the analysis pipeline and the local backend.

pub mod comparison;
pub mod listing;
pub mod report;

pub use comparison::{
    Comparison, ComparisonAnalysis, ComparisonStatus, DateRange, ParameterComparison,
    PatientSummary, Priority, ProcessingStage, Recommendation, Trend, UploadedFile, ValuePoint,
};
pub use listing::{
    ComparisonStats, ComparisonSummary, ListFilter, MonthCount, Page, StatusCounts,
    SubmitResponse, DEFAULT_PAGE_LIMIT,
};
pub use report::{Report, ResultStatus, StructuredReport, TestResult};
