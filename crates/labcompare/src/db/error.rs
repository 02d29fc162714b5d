//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A stored column could not be converted back into the model.
    #[error("Corrupt value in column '{column}': {reason}")]
    Corrupt { column: &'static str, reason: String },

    #[error("Failed to encode column '{column}': {reason}")]
    Encode { column: &'static str, reason: String },

    #[error("Database lock poisoned")]
    LockPoisoned,
}
