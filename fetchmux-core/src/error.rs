use std::process::ExitStatus;

use thiserror::Error;

use crate::tracker::StreamChannel;

/// Error taxonomy for the download/merge pipeline.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0} not found. Is it installed and in your PATH?")]
    DependencyNotFound(String),

    #[error("Failed to start {0}: {1}")]
    CommandStart(String, std::io::Error),

    #[error("Metadata probe failed: {0}")]
    ProbeFailed(String),

    #[error("Malformed probe output: {0}")]
    ProbeParse(#[from] serde_json::Error),

    #[error("No matching stream variant: {0}")]
    NoMatchingVariant(String),

    #[error("Invalid path: {0}")]
    PathError(String),

    #[error("{channel} stream failed: {source}")]
    StreamFailed {
        channel: StreamChannel,
        source: Box<CoreError>,
    },

    #[error("Merge process exited with {0}")]
    MergerFailed(ExitStatus),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type for pipeline operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
