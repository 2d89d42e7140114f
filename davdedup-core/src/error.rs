//! Error types for davdedup.

use thiserror::Error;

/// Errors that can occur while planning or applying a cleanup.
#[derive(Error, Debug)]
pub enum DedupError {
    /// A configuration value is out of range. Raised before any processing.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A single record could not be turned into a [`crate::Record`].
    /// Callers skip the record and keep going.
    #[error("Could not parse record {id}: {reason}")]
    Parse { id: String, reason: String },

    /// The remote store refused or failed a fetch/delete/write call.
    #[error("Store error: {0}")]
    Collaborator(String),

    #[error("ICS generation error: {0}")]
    IcsGenerate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DedupError {
    pub(crate) fn parse(id: impl Into<String>, reason: impl Into<String>) -> Self {
        DedupError::Parse {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for davdedup operations.
pub type DedupResult<T> = Result<T, DedupError>;
