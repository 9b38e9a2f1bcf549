// src/error.rs

//! Error types for the repackaging engine
//!
//! All library modules return [`Result`] with this crate-wide [`Error`] enum.
//! Unit-level failures are wrapped with descriptor/artifact context at the
//! unit-processor boundary and collected per category by the scheduler.

use thiserror::Error;

/// Result type alias using our Error enum
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the repackaging engine
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    IoError(String),

    /// Descriptor or run configuration problem (missing key, bad value)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Version cannot be interpreted as a two-segment branch
    #[error("Version '{version}' cannot be interpreted as a branch")]
    InvalidBranch { version: String },

    /// Remote resource does not exist (HTTP 404, all mirrors exhausted)
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Download failed for a reason other than not-found
    #[error("Download error: {0}")]
    DownloadError(String),

    /// Two merged archives contribute the same non-mergeable path
    #[error("Merge conflict: {path} from {origin} already exists in the working tree")]
    MergeConflict { path: String, origin: String },

    /// Archive could not be read or written
    #[error("Archive error: {0}")]
    ArchiveError(String),

    /// Malformed manifest header block
    #[error("Manifest error: {0}")]
    ManifestError(String),

    /// Failure while processing a unit, with descriptor/artifact context
    #[error("Cannot process {context}: {source}")]
    UnitError {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an error with the failing descriptor path or artifact identity.
    pub fn in_unit(self, context: impl Into<String>) -> Self {
        Error::UnitError {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::ArchiveError(e.to_string())
    }
}
