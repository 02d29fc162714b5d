pub mod analysis;
pub mod api;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod poller;
pub mod secrets;
pub mod session;
pub mod store;
pub mod submit;

pub use analysis::{compare_reports, TrendPolicy};
pub use api::{ComparisonApi, HttpComparisonApi};
pub use backend::LocalBackend;
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{ApiError, ConfigError, ExtractError, LabCompareError, Result, ValidationError};
pub use extract::{FixtureAnalyzer, ReportAnalyzer, SidecarAnalyzer};
pub use poller::{JobPoller, PollEvent, PollState, PollerConfig};
pub use secrets::SecretError;
pub use session::{ComparisonSession, JobWatch};
pub use store::ComparisonStore;
pub use submit::{SubmissionRequest, Submitter, UploadFile, UploadLimits};
