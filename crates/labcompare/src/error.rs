use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabCompareError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Local submission checks. Every variant names the inputs that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unsupported file type for: {}", files.join(", "))]
    UnsupportedFileTypes { files: Vec<String> },

    #[error("Files exceed the {max_bytes} byte limit: {}", files.join(", "))]
    FilesTooLarge { files: Vec<String>, max_bytes: u64 },

    #[error("Too many files selected: {count} (maximum {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("At least {min} reports are required, got {count}")]
    TooFewFiles { count: usize, min: usize },

    #[error("Patient id is required")]
    MissingPatientId,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Comparison '{0}' not found")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl ApiError {
    /// True for failures worth retrying: transport errors, 5xx and 429.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(_) => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Backend(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("No structured report available for '{0}'")]
    Missing(String),

    #[error("Failed to read structured report '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse structured report for '{file}': {reason}")]
    Parse { file: String, reason: String },

    #[error("Analyzer failed on '{file}': {reason}")]
    Analyzer { file: String, reason: String },
}

pub type Result<T> = std::result::Result<T, LabCompareError>;
