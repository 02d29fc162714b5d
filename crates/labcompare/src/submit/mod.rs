//! Job Submitter: local validation and a single submission call.

mod request;

pub use request::{default_comparison_name, validate_files, SubmissionRequest, UploadLimits};

use std::path::Path;
use std::sync::Arc;

use crate::api::ComparisonApi;
use crate::error::{ApiError, Result};
use crate::models::SubmitResponse;

/// One document selected for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk; the MIME type is guessed from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Validates selections and hands them to the backend.
///
/// Each `submit` call makes at most one API request; a validation failure
/// makes none. Guarding against double submission is the caller's job.
pub struct Submitter {
    api: Arc<dyn ComparisonApi>,
    limits: UploadLimits,
}

impl Submitter {
    pub fn new(api: Arc<dyn ComparisonApi>, limits: UploadLimits) -> Self {
        Self { api, limits }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Validate against today's date and submit.
    pub async fn submit(
        &self,
        files: Vec<UploadFile>,
        patient_id: &str,
        comparison_name: Option<&str>,
        custom_prompt: Option<&str>,
    ) -> Result<SubmitResponse> {
        let today = chrono::Local::now().date_naive();
        let request = SubmissionRequest::new(
            files,
            patient_id,
            comparison_name,
            custom_prompt,
            &self.limits,
            today,
        )
        .inspect_err(|e| log::warn!("Submission rejected: {}", e))?;

        Ok(self.send(request).await?)
    }

    /// Submit an already validated request.
    pub async fn send(
        &self,
        request: SubmissionRequest,
    ) -> std::result::Result<SubmitResponse, ApiError> {
        log::info!(
            "Submitting comparison '{}' for patient {} ({} reports)",
            request.comparison_name,
            request.patient_id,
            request.files.len()
        );
        let response = self.api.submit(request).await?;
        log::info!(
            "Comparison {} accepted with status {}",
            response.comparison_id,
            response.status
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockApi;
    use crate::error::{LabCompareError, ValidationError};
    use std::io::Write;

    fn pdf(name: &str) -> UploadFile {
        UploadFile::new(name, "application/pdf", b"%PDF-1.4".to_vec())
    }

    #[test]
    fn test_from_path_guesses_mime() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"%PDF-1.4").unwrap();
        let upload = UploadFile::from_path(file.path()).unwrap();
        assert_eq!(upload.mime_type, "application/pdf");
        assert_eq!(upload.size(), 8);
        assert!(upload.file_name.ends_with(".pdf"));

        let png = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        assert_eq!(UploadFile::from_path(png.path()).unwrap().mime_type, "image/png");

        let unknown = tempfile::Builder::new().suffix(".xyz").tempfile().unwrap();
        assert_eq!(
            UploadFile::from_path(unknown.path()).unwrap().mime_type,
            "application/octet-stream"
        );
    }

    #[test]
    fn test_debug_omits_bytes() {
        let debug = format!("{:?}", pdf("a.pdf"));
        assert!(debug.contains("size: 8"));
        assert!(!debug.contains("bytes"));
    }

    #[tokio::test]
    async fn test_submit_makes_one_call() {
        let api = Arc::new(MockApi::default());
        let submitter = Submitter::new(api.clone(), UploadLimits::default());

        let response = submitter
            .submit(vec![pdf("a.pdf"), pdf("b.pdf")], "P1", None, None)
            .await
            .unwrap();

        assert_eq!(response.report_count, 2);
        assert_eq!(api.submissions().len(), 1);
        assert!(api.submissions()[0]
            .comparison_name
            .starts_with("Test Comparison - "));
    }

    #[tokio::test]
    async fn test_invalid_submission_makes_no_call() {
        let api = Arc::new(MockApi::default());
        let submitter = Submitter::new(api.clone(), UploadLimits::default());

        let err = submitter
            .submit(vec![pdf("a.pdf")], "P1", None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LabCompareError::Validation(ValidationError::TooFewFiles { count: 1, min: 2 })
        ));

        let err = submitter
            .submit(
                vec![pdf("a.pdf"), UploadFile::new("notes.txt", "text/plain", vec![])],
                "P1",
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LabCompareError::Validation(ValidationError::UnsupportedFileTypes { .. })
        ));

        assert!(api.submissions().is_empty());
    }
}
