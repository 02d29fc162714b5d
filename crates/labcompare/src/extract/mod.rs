//! Per-report analyzer seam: document in, structured lab values out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ExtractError;
use crate::models::StructuredReport;
use crate::submit::UploadFile;

/// Turns one uploaded document into structured results.
///
/// The comparison pipeline only sees the returned [`StructuredReport`], so any
/// extraction strategy can sit behind this trait.
#[async_trait]
pub trait ReportAnalyzer: Send + Sync {
    async fn extract(&self, file: &UploadFile) -> Result<StructuredReport, ExtractError>;
}

/// Reads a pre-extracted JSON report stored next to each document.
///
/// For `jan.pdf` it looks for `jan.pdf.json`, then `jan.json`, in `dir`.
pub struct SidecarAnalyzer {
    dir: PathBuf,
}

impl SidecarAnalyzer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn candidates(&self, file_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![self.dir.join(format!("{}.json", file_name))];
        if let Some(stem) = Path::new(file_name).file_stem() {
            let by_stem = self
                .dir
                .join(format!("{}.json", stem.to_string_lossy()));
            if !paths.contains(&by_stem) {
                paths.push(by_stem);
            }
        }
        paths
    }
}

#[async_trait]
impl ReportAnalyzer for SidecarAnalyzer {
    async fn extract(&self, file: &UploadFile) -> Result<StructuredReport, ExtractError> {
        for path in self.candidates(&file.file_name) {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(ExtractError::Read { path, source }),
            };
            log::debug!("Using sidecar {} for {}", path.display(), file.file_name);
            return parse_structured_report(&file.file_name, &content);
        }
        Err(ExtractError::Missing(file.file_name.clone()))
    }
}

/// Parse analyzer JSON output for `file_name`.
pub fn parse_structured_report(
    file_name: &str,
    content: &str,
) -> Result<StructuredReport, ExtractError> {
    serde_json::from_str(content).map_err(|e| ExtractError::Parse {
        file: file_name.to_string(),
        reason: e.to_string(),
    })
}

/// Serves fixed reports keyed by file name.
#[derive(Default)]
pub struct FixtureAnalyzer {
    reports: HashMap<String, StructuredReport>,
}

impl FixtureAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report(mut self, file_name: impl Into<String>, report: StructuredReport) -> Self {
        self.reports.insert(file_name.into(), report);
        self
    }
}

#[async_trait]
impl ReportAnalyzer for FixtureAnalyzer {
    async fn extract(&self, file: &UploadFile) -> Result<StructuredReport, ExtractError> {
        self.reports
            .get(&file.file_name)
            .cloned()
            .ok_or_else(|| ExtractError::Missing(file.file_name.clone()))
    }
}
