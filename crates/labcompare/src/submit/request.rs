use chrono::NaiveDate;

use super::UploadFile;
use crate::error::ValidationError;

const MAX_REPORTS: usize = 10;
const MIN_REPORTS: usize = 2;

/// Upload constraints checked before anything reaches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    pub min_files: usize,
    pub max_files: usize,
    pub max_file_bytes: u64,
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            min_files: MIN_REPORTS,
            max_files: MAX_REPORTS,
            max_file_bytes: 15 * 1024 * 1024,
            allowed_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "application/pdf".to_string(),
            ],
        }
    }
}

impl UploadLimits {
    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime_type.trim()))
    }
}

/// Check file types, sizes and count, in that order.
///
/// Type and size failures name every offending file.
pub fn validate_files(files: &[UploadFile], limits: &UploadLimits) -> Result<(), ValidationError> {
    let unsupported: Vec<String> = files
        .iter()
        .filter(|f| !limits.allows(&f.mime_type))
        .map(|f| f.file_name.clone())
        .collect();
    if !unsupported.is_empty() {
        return Err(ValidationError::UnsupportedFileTypes { files: unsupported });
    }

    let oversized: Vec<String> = files
        .iter()
        .filter(|f| f.size() > limits.max_file_bytes)
        .map(|f| f.file_name.clone())
        .collect();
    if !oversized.is_empty() {
        return Err(ValidationError::FilesTooLarge {
            files: oversized,
            max_bytes: limits.max_file_bytes,
        });
    }

    if files.len() > limits.max_files {
        return Err(ValidationError::TooManyFiles {
            count: files.len(),
            max: limits.max_files,
        });
    }
    if files.len() < limits.min_files {
        return Err(ValidationError::TooFewFiles {
            count: files.len(),
            min: limits.min_files,
        });
    }
    Ok(())
}

pub fn default_comparison_name(today: NaiveDate) -> String {
    format!("Test Comparison - {}", today.format("%Y-%m-%d"))
}

/// A validated submission. Only [`SubmissionRequest::new`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub files: Vec<UploadFile>,
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub comparison_name: String,
    pub custom_prompt: Option<String>,
}

impl SubmissionRequest {
    /// Validate and package a submission.
    ///
    /// Blank names and prompts count as absent; a missing name becomes
    /// `"Test Comparison - <today>"`.
    pub fn new(
        files: Vec<UploadFile>,
        patient_id: &str,
        comparison_name: Option<&str>,
        custom_prompt: Option<&str>,
        limits: &UploadLimits,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        validate_files(&files, limits)?;

        let patient_id = patient_id.trim();
        if patient_id.is_empty() {
            return Err(ValidationError::MissingPatientId);
        }

        let comparison_name = non_blank(comparison_name)
            .map(str::to_string)
            .unwrap_or_else(|| default_comparison_name(today));

        Ok(Self {
            files,
            patient_id: patient_id.to_string(),
            doctor_id: None,
            comparison_name,
            custom_prompt: non_blank(custom_prompt).map(str::to_string),
        })
    }

    pub fn with_doctor(mut self, doctor_id: Option<&str>) -> Self {
        self.doctor_id = non_blank(doctor_id).map(str::to_string);
        self
    }

    pub fn report_count(&self) -> usize {
        self.files.len()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
