use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BrowserError {
    #[error("store error {code}: {message}")]
    Store { code: String, message: String },

    #[error("archive {key} is {size} bytes, exceeds the {limit} byte ceiling")]
    ArchiveTooLarge { key: String, size: u64, limit: u64 },

    #[error("archive {key} contains no HTML report")]
    ReportNotFound { key: String },

    #[error("archive {key} is not a valid zip: {message}")]
    MalformedArchive { key: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid subfolder: {0}")]
    InvalidSubfolder(String),

    #[error("async runtime error: {0}")]
    Runtime(String),
}
