use std::path::PathBuf;

use labcompare::LabCompareError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] LabCompareError),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write JSON output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// The tracked job did not end in `completed`.
    #[error("{0}")]
    JobUnsuccessful(String),
}

impl From<labcompare::ApiError> for CliError {
    fn from(err: labcompare::ApiError) -> Self {
        CliError::Core(err.into())
    }
}

impl CliError {
    /// Process exit code: 2 when the job is still running or failed server-side.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::JobUnsuccessful(_) => 2,
            _ => 1,
        }
    }
}
