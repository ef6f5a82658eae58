// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use crate::pipeline::ExportResult;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error, is there a network issue? {0}")]
    Network(String),

    #[error("Submission stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Signature verification failed: {0}")]
    Signature(String),

    #[error("Response did not match any known type (field {field_id})")]
    UnknownResponseType { field_id: String },

    #[error("Attachment download failed: {0}")]
    Attachment(String),

    #[error("Decryption worker unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export cancelled")]
    Cancelled,

    #[error(
        "No responses could be decrypted: expected {}, errors {}, unverified {}",
        .result.expected_count,
        .result.error_count,
        .result.unverified_count
    )]
    AllRecordsFailed { result: ExportResult },
}

impl From<reqwest::Error> for ExportError {
    fn from(err: reqwest::Error) -> Self {
        ExportError::Network(err.to_string())
    }
}
