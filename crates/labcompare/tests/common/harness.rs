//! Isolated session over a temp-directory SQLite backend.

use std::sync::Arc;
use std::time::Duration;

use labcompare::extract::ReportAnalyzer;
use labcompare::{
    ComparisonSession, Database, LocalBackend, PollerConfig, TrendPolicy, UploadLimits,
};
use tempfile::TempDir;

pub struct TestHarness {
    pub backend: Arc<LocalBackend>,
    pub session: ComparisonSession,
    _dir: TempDir,
}

impl TestHarness {
    /// Polls every second, giving up after 10 attempts.
    pub fn new(analyzer: impl ReportAnalyzer + 'static) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db = Database::open(&dir.path().join("data").join("labcompare.db"))
            .expect("Failed to open database");
        let backend = Arc::new(LocalBackend::new(
            db,
            Arc::new(analyzer),
            TrendPolicy::default(),
        ));
        let session = ComparisonSession::new(
            backend.clone(),
            UploadLimits::default(),
            PollerConfig {
                interval: Duration::from_secs(1),
                max_attempts: 10,
            },
        );
        Self {
            backend,
            session,
            _dir: dir,
        }
    }
}
